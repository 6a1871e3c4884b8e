use axum::{http::StatusCode, response::Response};

use postbox_types::api::VersionResponse;

use crate::error::render;

/// GET /version/ — build metadata stamped in at compile time.
pub async fn version() -> Response {
    render(
        StatusCode::OK,
        &VersionResponse {
            build_time: option_env!("POSTBOX_BUILD_TIME").unwrap_or("unknown").to_string(),
            commit: option_env!("POSTBOX_COMMIT").unwrap_or("unknown").to_string(),
            release: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}
