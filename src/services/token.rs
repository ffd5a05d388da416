//! Desktop token codec
//!
//! Mints and checks the HS256 JWT handed to desktop clients. The codec only
//! answers "is this token authentic and unexpired"; whether it is still
//! backed by a stored session is the verification service's job.

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DesktopAuthError;
use crate::models::desktop_session_ttl;

/// Claims carried by a desktop token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub app_id: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Random id so that two mints in the same second differ
    pub jti: String,
}

/// A freshly signed token together with its lifetime
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and validates desktop tokens with a shared secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a token issued now
    pub fn mint(
        &self,
        user_id: &str,
        email: &str,
        app_id: &str,
    ) -> Result<MintedToken, DesktopAuthError> {
        self.mint_at(user_id, email, app_id, Utc::now())
    }

    /// Mint a token issued at `issued_at` (truncated to whole seconds)
    pub fn mint_at(
        &self,
        user_id: &str,
        email: &str,
        app_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<MintedToken, DesktopAuthError> {
        let issued_at = issued_at.trunc_subsecs(0);
        let expires_at = issued_at + desktop_session_ttl();

        let claims = DesktopClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            app_id: app_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DesktopAuthError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))?;

        Ok(MintedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify signature then expiry, returning the claims
    ///
    /// Only a value with no `.` at all is `Malformed`. Anything shaped like a
    /// JWT that fails to decode, including a wrong segment count, is treated
    /// as a forgery.
    pub fn check(&self, token: &str) -> Result<DesktopClaims, DesktopAuthError> {
        if !token.contains('.') {
            return Err(DesktopAuthError::Malformed);
        }

        decode::<DesktopClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => DesktopAuthError::Expired,
                _ => DesktopAuthError::InvalidSignature,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret")
    }

    #[test]
    fn test_mint_and_check_round_trip() {
        let codec = codec();
        let minted = codec.mint("u1", "a@b.c", "default").unwrap();

        let claims = codec.check(&minted.token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.app_id, "default");
        assert_eq!(claims.iat, minted.issued_at.timestamp());
        assert_eq!(claims.exp, minted.expires_at.timestamp());
    }

    #[test]
    fn test_lifetime_is_fixed() {
        let minted = codec().mint("u1", "", "default").unwrap();

        assert_eq!(minted.expires_at - minted.issued_at, Duration::hours(24));
        assert_eq!(minted.issued_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_same_second_mints_differ() {
        let codec = codec();
        let at = Utc::now();

        let first = codec.mint_at("u1", "", "default", at).unwrap();
        let second = codec.mint_at("u1", "", "default", at).unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();

        assert!(matches!(codec.check("not-a-jwt"), Err(DesktopAuthError::Malformed)));
        assert!(matches!(codec.check("a.b"), Err(DesktopAuthError::InvalidSignature)));
        assert!(matches!(codec.check("a.b.c.d"), Err(DesktopAuthError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_separator_is_invalid_signature() {
        let codec = codec();
        let token = codec.mint("u1", "a@b.c", "default").unwrap().token;
        let dot = token.find('.').unwrap();

        let mut merged = token.clone().into_bytes();
        merged[dot] = b'A';
        assert!(matches!(
            codec.check(&String::from_utf8(merged).unwrap()),
            Err(DesktopAuthError::InvalidSignature)
        ));

        let mut split = token.into_bytes();
        split[dot + 1] = b'.';
        assert!(matches!(
            codec.check(&String::from_utf8(split).unwrap()),
            Err(DesktopAuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let minted = codec().mint("u1", "", "default").unwrap();
        let other = TokenCodec::new("another-secret");

        assert!(matches!(
            other.check(&minted.token),
            Err(DesktopAuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let minted = codec
            .mint_at("u1", "", "default", Utc::now() - Duration::hours(25))
            .unwrap();

        assert!(matches!(codec.check(&minted.token), Err(DesktopAuthError::Expired)));
    }

    #[test]
    fn test_expired_forgery_reports_signature() {
        let minted = codec()
            .mint_at("u1", "", "default", Utc::now() - Duration::hours(25))
            .unwrap();

        assert!(matches!(
            TokenCodec::new("another-secret").check(&minted.token),
            Err(DesktopAuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_segments_are_invalid_signature() {
        assert!(matches!(
            codec().check("abc.def.ghi"),
            Err(DesktopAuthError::InvalidSignature)
        ));
    }
}
