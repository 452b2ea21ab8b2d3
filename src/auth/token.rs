use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BEARER: &str = "Bearer";

/// 令牌中携带的用户身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub iat: i64,    // 签发时间
    pub exp: i64,    // 过期时间
    pub jti: String, // 令牌唯一标识，同一秒内多次登录也不会得到相同令牌
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no bearer token")]
    Missing,
    #[error("token expired")]
    Expired,
    #[error("signature mismatch")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// HS256 令牌的签发与校验，密钥只保存在服务端
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // 不留宽限期：now > exp 即拒绝
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            user_id: identity.user_id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs() as i64),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

/// 只接受 `Bearer <token>` 形式（前缀区分大小写）
pub fn extract_from_header(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(ttl_secs: u64) -> TokenCodec {
        TokenCodec::new("test-secret", Duration::from_secs(ttl_secs))
    }

    fn alice() -> Identity {
        Identity {
            user_id: 7,
            username: "alice".into(),
            email: Some("alice@example.com".into()),
        }
    }

    #[test]
    fn issued_token_verifies_to_same_claims() {
        let codec = codec(3600);
        let (token, claims) = codec.issue(&alice()).unwrap();

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.identity(), alice());
        assert_eq!(verified.exp - verified.iat, 3600);
    }

    #[test]
    fn tokens_issued_together_differ() {
        let codec = codec(3600);
        let now = Utc::now();
        let (first, _) = codec.issue_at(&alice(), now).unwrap();
        let (second, _) = codec.issue_at(&alice(), now).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn token_past_ttl_is_expired() {
        let codec = codec(3600);
        let issued = Utc::now() - chrono::Duration::hours(2);
        let (token, _) = codec.issue_at(&alice(), issued).unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn other_secret_is_rejected() {
        let (token, _) = codec(3600).issue(&alice()).unwrap();
        let other = TokenCodec::new("another-secret", Duration::from_secs(3600));

        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn altering_any_byte_invalidates_token() {
        let codec = codec(3600);
        let (token, _) = codec.issue(&alice()).unwrap();

        for idx in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(codec.verify(&tampered).is_err(), "byte {idx} accepted");
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(codec(60).verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec(60).verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn extracts_bearer_tokens_only() {
        assert_eq!(extract_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_from_header(Some("abc")), None);
        assert_eq!(extract_from_header(None), None);
        assert_eq!(extract_from_header(Some("bearer abc")), None);
        assert_eq!(extract_from_header(Some("Bearer ")), None);
        assert_eq!(extract_from_header(Some("Bearer abc def")), None);
        assert_eq!(extract_from_header(Some("Basic abc")), None);
    }
}
