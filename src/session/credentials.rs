//! Sender credentials captured through `/setup`.

use secrecy::{ExposeSecret, SecretString};

/// The mailbox a user sends from and the SMTP secret that unlocks it.
#[derive(Debug, Clone)]
pub struct SenderCredentials {
    address: String,
    secret: SecretString,
}

impl SenderCredentials {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Sender address, also used as the SMTP login.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Whether `secret` matches the stored one.
    pub fn secret_matches(&self, secret: &str) -> bool {
        self.secret.expose_secret() == secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secret() {
        let creds = SenderCredentials::new("a@x.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("a@x.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn secret_matches_exact_value_only() {
        let creds = SenderCredentials::new("a@x.com", "pw1");
        assert!(creds.secret_matches("pw1"));
        assert!(!creds.secret_matches("pw2"));
        assert_eq!(creds.secret().expose_secret(), "pw1");
    }
}
