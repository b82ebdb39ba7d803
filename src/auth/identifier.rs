use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Contact channel a deployment verifies users through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Email,
    Mobile,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierKind::Email => "email",
            IdentifierKind::Mobile => "mobile",
        }
    }

    /// Normalize and validate a raw value for this channel.
    pub fn parse_value(self, raw: &str) -> Result<Identifier, String> {
        match self {
            IdentifierKind::Email => {
                let email = raw.trim().to_lowercase();
                if email.is_empty() {
                    return Err("Email is required".into());
                }
                if !is_valid_email(&email) {
                    return Err("Please enter a valid email address".into());
                }
                Ok(Identifier::Email(email))
            }
            IdentifierKind::Mobile => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err("Mobile number is required".into());
                }
                let mobile = normalize_mobile(trimmed);
                if !is_valid_mobile(&mobile) {
                    return Err("Please enter a valid mobile number".into());
                }
                Ok(Identifier::Mobile(mobile))
            }
        }
    }
}

impl FromStr for IdentifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(IdentifierKind::Email),
            "mobile" | "phone" => Ok(IdentifierKind::Mobile),
            other => Err(format!("unknown identifier kind: {other}")),
        }
    }
}

/// A user's contact channel. Serializes as `{"email": ..}` or `{"mobile": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identifier {
    Email(String),
    Mobile(String),
}

impl Identifier {
    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identifier::Email(_) => IdentifierKind::Email,
            Identifier::Mobile(_) => IdentifierKind::Mobile,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Email(v) | Identifier::Mobile(v) => v,
        }
    }

    /// Rebuild from the `(kind, value)` pair stored in the database.
    pub fn from_parts(kind: &str, value: String) -> Option<Self> {
        match kind.parse::<IdentifierKind>().ok()? {
            IdentifierKind::Email => Some(Identifier::Email(value)),
            IdentifierKind::Mobile => Some(Identifier::Mobile(value)),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_mobile(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

fn is_valid_mobile(mobile: &str) -> bool {
    lazy_static! {
        static ref MOBILE_RE: Regex = Regex::new(r"^\+?[0-9]{10,15}$").unwrap();
    }
    MOBILE_RE.is_match(mobile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let id = IdentifierKind::Email.parse_value("  Alice@Example.COM ").unwrap();
        assert_eq!(id, Identifier::Email("alice@example.com".into()));
    }

    #[test]
    fn email_rejects_garbage() {
        assert!(IdentifierKind::Email.parse_value("not-an-email").is_err());
        assert!(IdentifierKind::Email.parse_value("a@b").is_err());
        assert!(IdentifierKind::Email.parse_value("   ").is_err());
    }

    #[test]
    fn mobile_strips_separators() {
        let id = IdentifierKind::Mobile.parse_value("+1 (555) 123-4567").unwrap();
        assert_eq!(id, Identifier::Mobile("+15551234567".into()));
    }

    #[test]
    fn mobile_requires_digit_count() {
        assert!(IdentifierKind::Mobile.parse_value("12345").is_err());
        assert!(IdentifierKind::Mobile.parse_value("1234567890123456").is_err());
        assert!(IdentifierKind::Mobile.parse_value("alice@example.com").is_err());
    }

    #[test]
    fn serializes_under_channel_name() {
        let json = serde_json::to_value(Identifier::Email("a@x.com".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "email": "a@x.com" }));
    }

    #[test]
    fn kind_parses_from_config_value() {
        assert_eq!("EMAIL".parse::<IdentifierKind>().unwrap(), IdentifierKind::Email);
        assert_eq!("mobile".parse::<IdentifierKind>().unwrap(), IdentifierKind::Mobile);
        assert!("fax".parse::<IdentifierKind>().is_err());
    }
}
