//! Sign-up input rules.

use serde::Deserialize;

use stockroom_core::DomainError;

use crate::identity_claim::normalize_key;

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_SECRET_LEN: usize = 6;

/// Raw sign-up form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    #[serde(alias = "safe_word")]
    pub secret: String,
}

/// A sign-up that passed validation. The secret is still plaintext here and
/// must be hashed before it goes anywhere near an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub secret: String,
}

impl RegistrationRequest {
    pub fn validate(self) -> Result<ValidRegistration, DomainError> {
        let name = self.name.trim().to_string();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name must be at least {MIN_NAME_LEN} characters"
            )));
        }

        let email = normalize_key(&self.email);
        if !looks_like_email(&email) {
            return Err(DomainError::validation("email is not valid"));
        }

        if self.secret.chars().count() < MIN_SECRET_LEN {
            return Err(DomainError::validation(format!(
                "safe word must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        Ok(ValidRegistration {
            name,
            email,
            secret: self.secret,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, email: &str, safe_word: &str) -> RegistrationRequest {
        RegistrationRequest {
            name: name.to_string(),
            email: email.to_string(),
            secret: safe_word.to_string(),
        }
    }

    #[test]
    fn valid_request_is_normalized() {
        let ok = req("  Alice ", "Alice@Example.COM", "secret1").validate().unwrap();
        assert_eq!(ok.name, "Alice");
        assert_eq!(ok.email, "alice@example.com");
    }

    #[test]
    fn short_name_is_rejected() {
        assert!(matches!(
            req("al", "a@b.co", "secret1").validate(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(req("alice", "a@b.co", "12345").validate().is_err());
        assert!(req("alice", "a@b.co", "123456").validate().is_ok());
    }

    #[test]
    fn bad_emails_are_rejected() {
        for email in ["", "alice", "@b.co", "a@", "a b@c.co"] {
            assert!(req("alice", email, "secret1").validate().is_err(), "{email}");
        }
    }
}
