//! services/api/src/web/cors.rs

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tower_http::cors::CorsLayer;

use crate::error::ApiError;

/// Every route is either a `GET` or a `POST`.
pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Allows credentialed requests from the single configured dashboard origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ApiError> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|_| ApiError::InvalidCorsOrigin {
            origin: origin.to_string(),
        })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_methods_with_routes_are_allowed() {
        assert!(!ALLOWED_METHODS.contains(&Method::PUT));
        assert!(!ALLOWED_METHODS.contains(&Method::DELETE));
        assert!(ALLOWED_METHODS.contains(&Method::POST));
    }

    #[test]
    fn origin_with_control_characters_is_refused() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(ApiError::InvalidCorsOrigin { .. })
        ));
    }
}
