//! Shared fixtures for the handler tests.

use axum::response::Response;
use crm_dashboard_core::test_support::{MemoryDatabase, ReversingHasher};
use std::sync::Arc;

use crate::adapters::MemoryKvAdapter;
use crate::config::Config;
use crate::web::state::AppState;

pub fn test_config() -> Config {
    Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "postgres://localhost/test".to_string()))
        .unwrap()
}

pub fn test_state_with(db: MemoryDatabase) -> (Arc<AppState>, Arc<MemoryDatabase>) {
    let db = Arc::new(db);
    let state = AppState::new(
        Arc::new(test_config()),
        db.clone(),
        Arc::new(MemoryKvAdapter::new()),
        Arc::new(ReversingHasher),
    );
    (Arc::new(state), db)
}

pub fn test_state() -> (Arc<AppState>, Arc<MemoryDatabase>) {
    test_state_with(MemoryDatabase::default())
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
