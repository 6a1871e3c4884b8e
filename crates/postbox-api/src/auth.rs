use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{
        SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use axum::{extract::State, http::StatusCode, response::Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use sha1::{Digest, Sha1};
use tracing::{info, warn};

use postbox_db::StoreError;
use postbox_types::api::{CredentialsRequest, LoginResponse, RegisterResponse};
use postbox_types::models::{Token, normalize_username};

use crate::error::{ApiError, render};
use crate::extract::JsonBody;
use crate::state::{AppState, blocking, with_db};

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Verified against when the username is unknown. Same Argon2 parameters as
/// `hash_password` produces, so both rejections cost one full verification.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$K3KypKLCE8scOUTxj4afEA$4l7k1sp0PWHZbkfYOKnBcDl/fYA+/UlcIKjcGeA1Los";

#[cfg(test)]
thread_local! {
    static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let (username, password) = validate_credentials(req)?;

    let password_hash = blocking("register", move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::internal("register", e))?;

    let name = username.clone();
    match with_db(&state, "register", move |db| db.create_user(&name, &password_hash)).await? {
        Ok(_) => {}
        Err(StoreError::Duplicate) => {
            return Err(ApiError::Duplicate("username already exists".into()));
        }
        Err(e) => return Err(ApiError::internal("register", e)),
    }

    // The row was just written, so failing to read it back is a server fault.
    let user = with_db(&state, "register", move |db| db.get_user_by_username(&username))
        .await?
        .map_err(|e| ApiError::internal("register", e))?;

    info!(user_id = user.id, username = %user.username, "User registered");

    Ok(render(
        StatusCode::CREATED,
        &RegisterResponse { user_id: user.id },
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let (username, password) = validate_credentials(req)?;

    let name = username.clone();
    let user = match with_db(&state, "login", move |db| db.get_user_by_username(&name)).await? {
        Ok(user) => Some(user),
        Err(StoreError::NotFound) => None,
        Err(e) => return Err(ApiError::internal("login", e)),
    };

    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let matches = blocking("login", move || verify_login(&password, stored_hash.as_deref()))
        .await?
        .map_err(|e| ApiError::internal("login", e))?;

    let user = match user {
        Some(user) if matches => user,
        Some(_) => {
            warn!(%username, "Login rejected: wrong password");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        None => {
            warn!(%username, "Login rejected: unknown user");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    let token = generate_token(user.id).map_err(|e| ApiError::internal("login", e))?;
    let issued = Token {
        user_id: user.id,
        updated_at: chrono::Utc::now(),
    };

    let user_id = user.id;
    let stored = token.clone();
    let now = issued.updated_at;
    with_db(&state, "login", move |db| db.upsert_token(user_id, &stored, now))
        .await?
        .map_err(|e| ApiError::internal("login", e))?;

    info!(user_id, "Token issued");

    Ok(render(
        StatusCode::OK,
        &LoginResponse {
            token,
            user_id,
            expire_time: issued.expires_at(state.token_ttl),
        },
    ))
}

/// Normalizes the username and rejects empty fields.
fn validate_credentials(req: CredentialsRequest) -> Result<(String, String), ApiError> {
    let username = normalize_username(&req.username);
    if username.is_empty() {
        return Err(ApiError::Validation("username is empty".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is empty".into()));
    }
    Ok((username, req.password))
}

/// Argon2id with a fresh random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("hashing password failed: {e}"))?;
    Ok(hash.to_string())
}

/// Checks a login attempt. Unknown users (`None`) are verified against
/// [`DUMMY_HASH`] and always fail, so they take as long as a wrong password.
fn verify_login(password: &str, stored_hash: Option<&str>) -> anyhow::Result<bool> {
    let matches = verify_password(password, stored_hash.unwrap_or(DUMMY_HASH))?;
    Ok(matches && stored_hash.is_some())
}

/// `Ok(false)` on a wrong password; `Err` only if the stored hash is unreadable.
pub fn verify_password(password: &str, password_hash: &str) -> anyhow::Result<bool> {
    #[cfg(test)]
    VERIFY_CALLS.with(|c| c.set(c.get() + 1));

    let parsed =
        PasswordHash::new(password_hash).map_err(|e| anyhow!("stored password hash is invalid: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh bearer token for `user_id`: base64 of SHA-1 over 16 random bytes
/// followed by the decimal user id.
pub fn generate_token(user_id: i64) -> anyhow::Result<String> {
    let mut nonce = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| anyhow!("reading random bytes failed: {e}"))?;
    Ok(token_from_nonce(&nonce, user_id))
}

fn token_from_nonce(nonce: &[u8; 16], user_id: i64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(user_id.to_string().as_bytes());
    B64.encode(hasher.finalize())
}
