//! services/api/src/bin/openapi.rs
//!
//! Dumps the REST API description as JSON. The output path is the first
//! argument, `openapi.json` when omitted.

use crm_api::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let document = ApiDoc::openapi();
    let paths = document.paths.paths.len();
    std::fs::write(&output, document.to_pretty_json()?)?;
    println!("Wrote {} ({} paths)", output.display(), paths);
    Ok(())
}
