use base64_light::{base64_decode, base64_encode_bytes};
use hmac::{Hmac, Mac};
use log::error;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::time::Timestamp;

/// How long an issued session token stays valid, in seconds.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

/// Signing key for session tokens. Tokens are stateless - the server
/// keeps no session table, a token is valid iff its signature checks
/// out and it hasn't expired.
#[derive(Clone)]
pub struct TokenKey(Vec<u8>);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    Malformed,
    InvalidSignature,
    Expired,
}

impl TokenKey {
    pub fn new(secret: &str) -> Self {
        Self(secret.as_bytes().to_vec())
    }

    pub fn issue(&self, user_id: &str) -> Result<String, ()> {
        self.issue_at(user_id, Timestamp::now()?)
    }

    fn issue_at(&self, user_id: &str, now: Timestamp) -> Result<String, ()> {
        let claims = Claims {
            sub: user_id.into(),
            iat: now.as_i64(),
            exp: now.as_i64() + TOKEN_TTL_SECS,
        };

        let payload = serde_json::to_string(&claims).map_err(|e| {
            error!("couldn't serialise token claims: {e:?}");
        })?;

        let payload = base64_encode_bytes(payload.as_bytes());
        let sig = base64_encode_bytes(&self.mac(&payload));

        Ok(format!("{payload}.{sig}"))
    }

    /// Expiry is checked before the signature: an expired token reports
    /// `Expired` whether or not it was also tampered with.
    pub fn verify(&self, token: &str) -> Result<String, VerifyError> {
        let (payload, sig) = token.split_once('.').ok_or(VerifyError::Malformed)?;

        let claims: Claims = serde_json::from_slice(&base64_decode(payload))
            .map_err(|_| VerifyError::Malformed)?;

        let now = Timestamp::now().map_err(|()| VerifyError::Malformed)?;
        if claims.exp <= now.as_i64() {
            return Err(VerifyError::Expired);
        }

        let mut mac = HmacSha256::new_from_slice(&self.0).map_err(|_| VerifyError::Malformed)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&base64_decode(sig))
            .map_err(|_| VerifyError::InvalidSignature)?;

        Ok(claims.sub)
    }

    fn mac(&self, payload: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key() -> TokenKey {
        TokenKey::new("test-secret")
    }

    fn long_ago() -> Timestamp {
        let now = Timestamp::now().unwrap();
        Timestamp::from_i64(now.as_i64() - 2 * TOKEN_TTL_SECS)
    }

    #[test]
    fn round_trip() {
        let token = key().issue("user-1").unwrap();
        assert_eq!(key().verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn expired() {
        let token = key().issue_at("user-1", long_ago()).unwrap();
        assert_eq!(key().verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn expired_wins_over_tampering() {
        let token = key().issue_at("user-1", long_ago()).unwrap();
        let (payload, _) = token.split_once('.').unwrap();

        let forged = format!("{payload}.{}", base64_encode_bytes(b"not a real mac"));
        assert_eq!(key().verify(&forged), Err(VerifyError::Expired));
    }

    #[test]
    fn wrong_key() {
        let token = TokenKey::new("other-secret").issue("user-1").unwrap();
        assert_eq!(key().verify(&token), Err(VerifyError::InvalidSignature));
    }

    #[test]
    fn swapped_payload() {
        let token = key().issue("user-1").unwrap();
        let other = key().issue("user-2").unwrap();

        let (_, sig) = token.split_once('.').unwrap();
        let (payload, _) = other.split_once('.').unwrap();

        assert_eq!(
            key().verify(&format!("{payload}.{sig}")),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn malformed() {
        assert_eq!(key().verify(""), Err(VerifyError::Malformed));
        assert_eq!(key().verify("no-dot-here"), Err(VerifyError::Malformed));
        assert_eq!(key().verify("not.json"), Err(VerifyError::Malformed));
    }
}
