use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MemberId;

/// Claims carried by a member access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberClaims {
    #[serde(rename = "id")]
    pub member_id: MemberId,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Missing bearer token")]
    Missing,

    #[error("Malformed token")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

/// Verifies (and, for tooling, issues) HS256 member tokens
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_seconds;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Decode and validate a raw token (without the `Bearer ` prefix)
    pub fn verify(&self, token: &str) -> Result<MemberClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        decode::<MemberClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
                _ => TokenError::Invalid,
            })
    }

    /// Sign a token for `member_id` valid for `ttl`
    pub fn issue(&self, member_id: MemberId, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = MemberClaims {
            member_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Invalid)
    }
}
