use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{config::TokenConfig, state::AppState};

/// Purpose a confirmation token was minted for. A token issued for one
/// intent never verifies as the other, even when otherwise valid.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Signup,
    ResetPassword,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub intent: Intent,
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token issued for a different intent")]
    WrongIntent,
    #[error("malformed token")]
    Malformed,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let TokenConfig {
            secret,
            ttl_minutes,
        } = state.config.token.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn issue(
        &self,
        identity: &str,
        intent: Intent,
        continuation: Option<String>,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: identity.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            intent,
            continuation,
        };
        let token = encode(&Header::new(Algorithm::HS512), &claims, &self.encoding)?;
        debug!(identity = %identity, intent = ?intent, "confirmation token issued");
        Ok(token)
    }

    /// Decode and check a token in one place: signature, structure, exact
    /// expiry (no leeway), then the embedded intent.
    pub fn verify(&self, token: &str, intent: Intent) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry is checked below so that `exp == now` already counts as
        // expired; the library check would let the boundary second through.
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Malformed)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if data.claims.exp as i64 <= now {
            return Err(TokenError::Expired);
        }
        if data.claims.intent != intent {
            return Err(TokenError::WrongIntent);
        }
        debug!(identity = %data.claims.sub, intent = ?intent, "confirmation token verified");
        Ok(data.claims)
    }
}
