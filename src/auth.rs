// Operator credential lookup: a user id and password either match a stored user or not.
// No sessions or tokens are issued.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::sinks::SinkError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Some` only when the user exists and the password matches.
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<Option<User>, SinkError>;
}

/// Lowercase hex SHA-256 of `"{user_id}:{password}"`. This is the form kept in the store and in
/// `[[auth.users]]` config entries.
pub fn password_digest(user_id: &str, password: &str) -> String {
    let mut h = Sha256::new();
    h.update(user_id.as_bytes());
    h.update(b":");
    h.update(password.as_bytes());
    format!("{:x}", h.finalize())
}

pub fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_salted_with_user_id() {
        let d = password_digest("operator", "changeme");
        assert_eq!(
            d,
            "6dd83c0644218101c6560eec12b2122d287e0cf64e2f6ea705583151a59beba8"
        );
        assert!(is_digest(&d));
        assert_ne!(d, password_digest("admin", "changeme"));
        assert!(!is_digest("6DD83C"));
    }
}
