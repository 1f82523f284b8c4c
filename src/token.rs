use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::{Role, User};

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_HOURS: i64 = 24;
/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL_HOURS: i64 = 168;

/// Identity
///
/// The subject a token speaks for: everything in the access claims except the
/// expiry. This is what `issue` signs and what the authorization gate publishes
/// into the request context once a token checks out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            subject_id: user.subject_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}

/// Claims
///
/// The signed payload of an access token. The JSON field names are part of the
/// wire contract: `{email, firstName, lastName, uid, userType, exp}` with `exp`
/// in Unix-epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "uid")]
    pub subject_id: String,
    #[serde(rename = "userType")]
    pub role: Role,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

impl Claims {
    fn stamp(identity: &Identity, expires_at: u64) -> Self {
        Self {
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            subject_id: identity.subject_id.clone(),
            role: identity.role,
            expires_at,
        }
    }

    /// Drops the expiry, leaving the identity the token was issued for.
    pub fn into_identity(self) -> Identity {
        Identity {
            subject_id: self.subject_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
        }
    }
}

/// RefreshClaims
///
/// The refresh token only has to prove who it was issued to and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "uid")]
    pub subject_id: String,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

trait Expiring {
    fn expires_at(&self) -> u64;
}

impl Expiring for Claims {
    fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

impl Expiring for RefreshClaims {
    fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

/// TokenPair
///
/// The two tokens handed out at Signup and Login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSecret,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// TokenService
///
/// Issues and verifies HS256-signed tokens with a single process-wide secret.
/// Stateless apart from the keys, which are immutable after construction, so a
/// clone can be handed to every request without locking.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    /// Builds the service from the signing secret. An empty secret is a
    /// configuration error and should stop the process at startup.
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.trim().is_empty() {
            return Err(TokenError::MissingSecret);
        }

        Ok(Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
        })
    }

    /// issue
    ///
    /// Signs an access token (24h) carrying the full identity and a refresh
    /// token (168h) carrying only the subject id.
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_exp = (now + Duration::hours(ACCESS_TOKEN_TTL_HOURS)).timestamp() as u64;
        let refresh_exp = (now + Duration::hours(REFRESH_TOKEN_TTL_HOURS)).timestamp() as u64;

        let access_claims = Claims::stamp(identity, access_exp);
        let refresh_claims = RefreshClaims {
            subject_id: identity.subject_id.clone(),
            expires_at: refresh_exp,
        };

        Ok(TokenPair {
            access_token: self.sign(&access_claims)?,
            refresh_token: self.sign(&refresh_claims)?,
        })
    }

    /// validate
    ///
    /// Verifies the signature, then the expiry. A token that fails the first
    /// check is never subjected to the second.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token)
    }

    /// Same ordering as [`TokenService::validate`], for refresh tokens.
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn verify<T>(&self, token: &str) -> Result<T, TokenError>
    where
        T: DeserializeOwned + Expiring,
    {
        // Expiry is checked by hand below so that it runs strictly after the
        // signature and without the library's default leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<T>(token, &self.keys.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })?
            .claims;

        let now = Utc::now().timestamp() as u64;
        if claims.expires_at() <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
