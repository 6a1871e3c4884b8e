use axum::{Extension, extract::State, http::StatusCode, response::Response};

use postbox_types::api::MeResponse;

use crate::error::{ApiError, render};
use crate::middleware::Identity;
use crate::state::{AppState, with_db};

/// GET /me. The token already proved the user exists, so any store
/// failure here is a server fault.
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, ApiError> {
    let user_id = identity.user_id;
    let user = with_db(&state, "me", move |db| db.get_user_by_id(user_id))
        .await?
        .map_err(|e| ApiError::internal("me", e))?;

    Ok(render(
        StatusCode::OK,
        &MeResponse {
            user_id: user.id,
            username: user.username,
        },
    ))
}
