use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::auth::AuthTokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user_id
    exp: i64,    // expiration timestamp
    iat: i64,
    token_type: TokenKind,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Token generation failed: {0}")]
    Signing(String),
}

/// Issues and verifies access/refresh token pairs
pub trait TokenService: Send + Sync {
    fn issue_pair(&self, user_id: Uuid) -> Result<AuthTokens, TokenError>;

    /// Returns the user id of a valid token of the expected kind
    fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError>;
}

/// HS256 implementation with one secret per token kind
pub struct JwtTokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtTokenService {
    pub fn new(
        access_secret: String,
        refresh_secret: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    fn sign(&self, user_id: Uuid, kind: TokenKind) -> Result<(String, chrono::DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expiration = now + ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            token_type: kind,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((token, expiration))
    }
}

impl TokenService for JwtTokenService {
    fn issue_pair(&self, user_id: Uuid) -> Result<AuthTokens, TokenError> {
        let (access_token, access_expires_at) = self.sign(user_id, TokenKind::Access)?;
        let (refresh_token, refresh_expires_at) = self.sign(user_id, TokenKind::Refresh)?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        if token_data.claims.token_type != kind {
            return Err(TokenError::Invalid);
        }

        Uuid::parse_str(&token_data.claims.sub).map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtTokenService {
        JwtTokenService::new(
            "access-secret".to_string(),
            "refresh-secret".to_string(),
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let service = service();
        let user_id = Uuid::new_v4();
        let tokens = service.issue_pair(user_id).unwrap();

        assert_eq!(service.verify(&tokens.access_token, TokenKind::Access).unwrap(), user_id);
        assert_eq!(service.verify(&tokens.refresh_token, TokenKind::Refresh).unwrap(), user_id);
        assert!(tokens.refresh_expires_at > tokens.access_expires_at);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let service = service();
        let tokens = service.issue_pair(Uuid::new_v4()).unwrap();

        assert!(matches!(
            service.verify(&tokens.refresh_token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            service.verify(&tokens.access_token, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_same_secret_still_checks_token_type() {
        let service = JwtTokenService::new(
            "shared".to_string(),
            "shared".to_string(),
            Duration::minutes(15),
            Duration::days(7),
        );
        let tokens = service.issue_pair(Uuid::new_v4()).unwrap();
        assert!(matches!(
            service.verify(&tokens.refresh_token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token() {
        // Well past the default 60s leeway
        let service = JwtTokenService::new(
            "access-secret".to_string(),
            "refresh-secret".to_string(),
            Duration::minutes(-5),
            Duration::days(7),
        );
        let tokens = service.issue_pair(Uuid::new_v4()).unwrap();
        assert!(matches!(
            service.verify(&tokens.access_token, TokenKind::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            service().verify("not.a.jwt", TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }
}
