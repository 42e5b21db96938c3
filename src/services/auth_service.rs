use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::{
    auth::{Claims, hash_passphrase, issue_tokens, verify_passphrase},
    config::Config,
    error::{AppError, Result},
    models::{AuthResponse, LoginRequest, NewUser, PublicUser, RegisterRequest, User},
    store::Store,
};

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("username pattern compiles"));

const INVALID_CREDENTIALS: &str = "Invalid username or passphrase";

fn is_valid_username(username: &str) -> bool {
    USERNAME.is_match(username)
}

/// 32 random bytes, hex encoded. Handed to the user once at registration.
fn generate_recovery_key() -> String {
    rand::random::<[u8; 32]>()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn auth_response(user: &User, config: &Config, recovery_key: Option<String>) -> Result<AuthResponse> {
    let tokens = issue_tokens(user, config)?;
    Ok(AuthResponse {
        user: PublicUser::from(user),
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        recovery_key,
    })
}

/// Refuses banned accounts, lifting bans whose expiry has passed.
async fn ensure_not_banned(store: &dyn Store, user: &User) -> Result<()> {
    if !user.is_banned {
        return Ok(());
    }

    if user.ban_has_lapsed(Utc::now()) {
        store.lift_ban(user.id).await?;
        tracing::info!("Expired ban lifted for user {}", user.id);
        return Ok(());
    }

    let message = match &user.ban_reason {
        Some(reason) => format!("Account is banned: {}", reason),
        None => "Account is banned".to_string(),
    };
    Err(AppError::Authorization(message))
}

pub async fn register(
    store: &dyn Store,
    config: &Config,
    request: &RegisterRequest,
) -> Result<AuthResponse> {
    if !is_valid_username(&request.username) {
        return Err(AppError::Validation(
            "Username may only contain letters, numbers, underscores and hyphens".to_string(),
        ));
    }

    let recovery_key = generate_recovery_key();
    let user = store
        .create_user(NewUser {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            passphrase_hash: hash_passphrase(&request.passphrase, config.bcrypt_cost)?,
            recovery_key_hash: hash_passphrase(&recovery_key, config.bcrypt_cost)?,
            device_fingerprint: request.device_fingerprint.clone(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!("User registered: {}", user.username);

    auth_response(&user, config, Some(recovery_key))
}

pub async fn login(
    store: &dyn Store,
    config: &Config,
    request: &LoginRequest,
) -> Result<AuthResponse> {
    let user = store
        .find_user_by_username(&request.username)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    if !verify_passphrase(&request.passphrase, &user.passphrase_hash)? {
        tracing::debug!("Failed login attempt for {}", request.username);
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    ensure_not_banned(store, &user).await?;
    store.record_login(user.id).await?;

    auth_response(&user, config, None)
}

pub async fn refresh(store: &dyn Store, config: &Config, refresh_token: &str) -> Result<AuthResponse> {
    let claims = Claims::verify(refresh_token, &config.jwt_refresh_secret)?;
    let user = store
        .get_user(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

    ensure_not_banned(store, &user).await?;

    auth_response(&user, config, None)
}

pub async fn current_user(store: &dyn Store, user_id: Uuid) -> Result<PublicUser> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(PublicUser::from(&user))
}
