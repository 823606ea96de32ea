//! Validated service names

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Longest accepted service name, in bytes.
pub const MAX_SERVICE_NAME_LEN: usize = 64;

/// Reasons a service name is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceNameError {
    #[error("service name is empty")]
    Empty,

    #[error("service name '{name}' is longer than {max} characters")]
    TooLong { name: String, max: usize },

    #[error("service name '{0}' must start with an ASCII letter")]
    InvalidStart(String),

    #[error("service name '{name}' contains invalid character {character:?}")]
    InvalidCharacter { name: String, character: char },
}

/// Name of a registered service
///
/// Names start with an ASCII letter and contain only ASCII letters, digits,
/// `-`, `_` and `.`. They double as the key of the service in the registry
/// and in service-discovery variables, which is why the alphabet is narrow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Validates and wraps a service name
    pub fn new(name: impl Into<String>) -> Result<Self, ServiceNameError> {
        let name = name.into();
        let mut chars = name.chars();

        match chars.next() {
            None => return Err(ServiceNameError::Empty),
            Some(first) if !first.is_ascii_alphabetic() => {
                return Err(ServiceNameError::InvalidStart(name));
            }
            Some(_) => {}
        }

        if name.len() > MAX_SERVICE_NAME_LEN {
            return Err(ServiceNameError::TooLong {
                name,
                max: MAX_SERVICE_NAME_LEN,
            });
        }

        if let Some(character) =
            chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ServiceNameError::InvalidCharacter { name, character });
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ServiceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServiceName {
    type Error = ServiceNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ServiceName {
    type Error = ServiceNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

impl PartialEq<str> for ServiceName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ServiceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["products", "store", "web-frontend", "cache_1", "api.v2"] {
            let parsed = ServiceName::new(name).unwrap();
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(ServiceName::new(""), Err(ServiceNameError::Empty));
    }

    #[test]
    fn test_name_must_start_with_letter() {
        assert_eq!(
            ServiceName::new("1products"),
            Err(ServiceNameError::InvalidStart("1products".to_string()))
        );
        assert!(ServiceName::new("-store").is_err());
    }

    #[test]
    fn test_invalid_character_rejected() {
        assert_eq!(
            ServiceName::new("my service"),
            Err(ServiceNameError::InvalidCharacter {
                name: "my service".to_string(),
                character: ' ',
            })
        );
    }

    #[test]
    fn test_too_long_rejected() {
        let name = "a".repeat(MAX_SERVICE_NAME_LEN + 1);
        assert!(matches!(
            ServiceName::new(name),
            Err(ServiceNameError::TooLong { .. })
        ));

        let name = "a".repeat(MAX_SERVICE_NAME_LEN);
        assert!(ServiceName::new(name).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let name: ServiceName = serde_json::from_str("\"store\"").unwrap();
        assert_eq!(name, "store");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"store\"");

        let bad: Result<ServiceName, _> = serde_json::from_str("\"bad name\"");
        assert!(bad.is_err());
    }
}
