use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    config::Config,
    error::{AppError, Result},
    models::{User, UserRole},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(user: &User, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn encode(&self, secret: &str) -> Result<String> {
        let token = encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_ref()),
        )?;
        Ok(token)
    }

    pub fn verify(token: &str, secret: &str) -> Result<Self> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Authentication("Invalid user ID in token".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Short-lived access token plus a refresh token signed with its own secret.
pub fn issue_tokens(user: &User, config: &Config) -> Result<TokenPair> {
    let access_token = Claims::new(user, Duration::minutes(config.access_token_ttl_minutes))
        .encode(&config.jwt_secret)?;
    let refresh_token = Claims::new(user, Duration::days(config.refresh_token_ttl_days))
        .encode(&config.jwt_refresh_secret)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        let claims = Claims::verify(bearer.token(), &state.config.jwt_secret)?;
        let user_id = claims.user_id()?;

        Ok(AuthUser {
            user_id,
            username: claims.username,
            role: claims.role,
        })
    }
}

// Optional auth user (for endpoints that work with or without auth)
#[derive(Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.user_id)
    }
}

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(_) => Ok(OptionalAuthUser(None)),
        }
    }
}

// Passphrase hashing utilities
pub fn hash_passphrase(passphrase: &str, cost: u32) -> Result<String> {
    bcrypt::hash(passphrase, cost).map_err(AppError::from)
}

pub fn verify_passphrase(passphrase: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(passphrase, hash).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            passphrase_hash: String::new(),
            recovery_key_hash: String::new(),
            device_fingerprint: None,
            role,
            karma: 0,
            is_banned: false,
            ban_reason: None,
            ban_expires_at: None,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn claims_round_trip_through_a_token() {
        let user = user(UserRole::Admin);
        let token = Claims::new(&user, Duration::minutes(5))
            .encode("secret")
            .unwrap();

        let claims = Claims::verify(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = Claims::new(&user(UserRole::User), Duration::minutes(5))
            .encode("one")
            .unwrap();
        assert!(matches!(
            Claims::verify(&token, "two"),
            Err(AppError::Jwt(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = Claims::new(&user(UserRole::User), Duration::minutes(-10))
            .encode("secret")
            .unwrap();
        assert!(Claims::verify(&token, "secret").is_err());
    }

    #[test]
    fn passphrase_hashes_verify() {
        let hash = hash_passphrase("correct horse", 4).unwrap();
        assert!(verify_passphrase("correct horse", &hash).unwrap());
        assert!(!verify_passphrase("battery staple", &hash).unwrap());
    }
}
