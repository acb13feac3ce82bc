//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - User context extraction for handlers
//! - Scope checks (the `admin` scope gates catalog and approval endpoints)

use crate::errors::{AppError, Result};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Scopes/permissions
    pub scopes: Vec<String>,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Check if the context has a specific scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(&scope.to_string()) || self.scopes.contains(&"admin".to_string())
    }

    /// Require a specific scope, returning error if not present
    pub fn require_scope(&self, scope: &str) -> Result<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Missing required scope: {}", scope),
            })
        }
    }

    /// Require the admin scope
    pub fn require_admin(&self) -> Result<()> {
        self.require_scope("admin")
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, scopes: Vec<String>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            scopes,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                    _ => AppError::InvalidToken,
                }
            })
    }

    /// Build an AuthContext from a bearer token
    pub fn authenticate(&self, token: &str, request_id: String) -> Result<AuthContext> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthContext {
            user_id,
            scopes: claims.scopes,
            request_id,
        })
    }
}

/// Hash a secret for storage
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate a secret against a stored hash
pub fn validate_secret(secret: &str, stored_hash: &str) -> bool {
    hash_secret(secret) == stored_hash
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for AuthContext
///
/// The auth middleware validates the bearer token and stores the context in
/// request extensions; handlers only see requests that carried a valid token.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing authentication context".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret() {
        let secret = "wh_test_12345";
        let hash = hash_secret(secret);
        assert!(validate_secret(secret, &hash));
        assert!(!validate_secret("wrong_secret", &hash));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer tok_123"), Some("tok_123"));
        assert_eq!(extract_bearer("tok_123"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let scopes = vec!["read".to_string(), "write".to_string()];

        let token = manager.generate_token(user_id, scopes.clone()).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.scopes, scopes);
    }

    #[test]
    fn test_authenticate_builds_context() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, vec!["admin".to_string()])
            .unwrap();
        let ctx = manager.authenticate(&token, "req-1".to_string()).unwrap();

        assert_eq!(ctx.user_id, user_id);
        assert!(ctx.require_admin().is_ok());
        assert!(ctx.has_scope("anything"));
    }

    #[test]
    fn test_scope_check_without_admin() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            scopes: vec!["read".to_string()],
            request_id: "req-2".to_string(),
        };

        assert!(ctx.has_scope("read"));
        assert!(ctx.require_scope("write").is_err());
        assert!(ctx.require_admin().is_err());
    }
}
