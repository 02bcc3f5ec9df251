//! Common types for Planeja+

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for projects
pub type ProjectId = Uuid;

/// Unique identifier for teams
pub type TeamId = Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// Unique identifier for invitations
pub type InvitationId = Uuid;

/// Unique identifier for invitation activity records
pub type ActivityId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address, trimming and lowercasing it
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        let (local, domain) = normalized.split_once('@')?;

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        if normalized.chars().any(char::is_whitespace) {
            return None;
        }
        // Require a dot-separated domain with no empty labels
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return None;
        }

        Some(Self::new(local, domain))
    }

    /// Get the full address
    pub fn as_string(&self) -> String {
        format!("{}@{}", self.local, self.domain)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Validation("Invalid email address".to_string()))
    }
}

/// Normalize an email for comparisons (trimmed, lowercase)
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The authenticated user performing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: normalize_email(&email.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_address_parse() {
        let email = EmailAddress::parse("  Ana.Silva@Example.com ").unwrap();
        assert_eq!(email.local, "ana.silva");
        assert_eq!(email.domain, "example.com");
        assert_eq!(email.as_string(), "ana.silva@example.com");
        assert_eq!(email.to_string(), "ana.silva@example.com");
    }

    #[test]
    fn test_email_address_invalid() {
        assert!(EmailAddress::parse("invalid").is_none());
        assert!(EmailAddress::parse("@example.com").is_none());
        assert!(EmailAddress::parse("user@").is_none());
        assert!(EmailAddress::parse("user@localhost").is_none());
        assert!(EmailAddress::parse("user@a..com").is_none());
        assert!(EmailAddress::parse("us er@example.com").is_none());
        assert!(EmailAddress::parse("a@b@example.com").is_none());
    }

    #[test]
    fn test_actor_normalizes_email() {
        let actor = Actor::new(Uuid::nil(), "Ana", "ANA@X.COM");
        assert_eq!(actor.email, "ana@x.com");
    }
}
