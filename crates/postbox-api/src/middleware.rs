use axum::{
    Extension,
    extract::{Path, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use postbox_db::StoreError;
use postbox_types::models::Message;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// The authenticated caller, attached by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
}

/// A message the caller is allowed to mutate, attached by [`authorize_message`].
#[derive(Debug, Clone)]
pub struct OwnedMessage(pub Message);

/// Resolve the bearer token to an [`Identity`], rejecting unknown and
/// expired tokens.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("missing authorization bearer header".into()))?;

    let record = match with_db(&state, "authenticate", move |db| db.get_token(&token)).await? {
        Ok(record) => record,
        Err(StoreError::NotFound) => return Err(ApiError::Unauthorized("invalid token".into())),
        Err(e) => return Err(ApiError::internal("authenticate", e)),
    };

    if record.is_expired(Utc::now(), state.token_ttl) {
        debug!(user_id = record.user_id, "Rejected expired token");
        return Err(ApiError::Unauthorized("expired token".into()));
    }

    req.extensions_mut().insert(Identity {
        user_id: record.user_id,
    });
    Ok(next.run(req).await)
}

/// Load the message named by the `{id}` path segment and let the request
/// through only when the caller sent it.
pub async fn authorize_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = parse_message_id(&raw_id).ok_or_else(|| ApiError::Validation("invalid id".into()))?;

    let msg = match with_db(&state, "authorize message", move |db| db.get_message(id)).await? {
        Ok(msg) => msg,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("invalid message id".into())),
        Err(e) => return Err(ApiError::internal("authorize message", e)),
    };

    if msg.sender_id != identity.user_id {
        debug!(
            user_id = identity.user_id,
            message_id = msg.id,
            "Rejected mutation by non-sender"
        );
        return Err(ApiError::Forbidden("not permitted".into()));
    }

    req.extensions_mut().insert(OwnedMessage(msg));
    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<String> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")?
        .trim();

    (!token.is_empty()).then(|| token.to_string())
}

/// Zero is never a valid id.
fn parse_message_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id != 0)
}
