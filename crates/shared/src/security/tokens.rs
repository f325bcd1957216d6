//! Signed bearer tokens (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("identity must not be blank")]
    BlankIdentity,
    #[error("token is expired")]
    Expired,
    #[error("token is invalid: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Outcome of resolving a bearer token to an identity. Verification failures
/// are carried as data so the request pipeline never has to unwind.
#[derive(Debug)]
pub enum TokenIdentity {
    Identity(Identity),
    NoIdentity(TokenError),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(
                i64::try_from(ttl_seconds)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            ),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        let identity = Identity::new(username).ok_or(TokenError::BlankIdentity)?;
        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.as_str().to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?
                .timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn extract_identity(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.decode_claims(token)?;
        Identity::new(&claims.sub).ok_or(TokenError::BlankIdentity)
    }

    pub fn validate(&self, token: &str) -> bool {
        match self.decode_claims(token) {
            Ok(claims) => claims.exp > Utc::now().timestamp() && !claims.sub.trim().is_empty(),
            Err(_) => false,
        }
    }

    pub fn identify(&self, token: &str) -> TokenIdentity {
        match self.extract_identity(token) {
            Ok(identity) => TokenIdentity::Identity(identity),
            Err(err) => TokenIdentity::NoIdentity(err),
        }
    }

    fn decode_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            })
    }
}
