use serde::Deserialize;
use uuid::Uuid;

use crate::heal::{Error, Result};

/// Body for `POST /api/auth/signup`. Fields default to empty so a
/// missing field surfaces as our own validation error rather than a
/// body-rejection from the framework.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signup {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Signin {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Signup {
    pub fn validate(&self) -> Result<()> {
        let complete = !self.username.is_empty()
            && !self.email.is_empty()
            && !self.password.is_empty()
            && !self.display_name.is_empty();

        complete.then_some(()).ok_or(Error::Validation)
    }
}

pub fn new_salt() -> String {
    Uuid::new_v4().to_string()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    sha256::digest(format!("{salt}:{password}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signup_requires_every_field() {
        let full = Signup {
            username: "a".into(),
            email: "a@x.com".into(),
            password: "p".into(),
            display_name: "A".into(),
        };
        assert!(full.validate().is_ok());

        let missing = Signup {
            password: String::new(),
            ..full
        };
        assert_eq!(missing.validate(), Err(Error::Validation));
    }

    #[test]
    fn hashes_are_salted() {
        let (s1, s2) = (new_salt(), new_salt());
        assert_ne!(hash_password(&s1, "p"), hash_password(&s2, "p"));
        assert_eq!(hash_password(&s1, "p"), hash_password(&s1, "p"));
    }
}
