//! Validated identifier types shared across the fleet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for identifier validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The identifier string is empty
    Empty,
    /// The identifier contains only whitespace
    WhitespaceOnly,
    /// The identifier has leading or trailing whitespace
    LeadingTrailingWhitespace,
    /// The identifier contains invalid characters
    InvalidCharacters,
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier cannot be empty"),
            Self::WhitespaceOnly => write!(f, "identifier cannot be whitespace-only"),
            Self::LeadingTrailingWhitespace => {
                write!(f, "identifier cannot have leading or trailing whitespace")
            }
            Self::InvalidCharacters => write!(
                f,
                "identifier can only contain alphanumeric characters, hyphens, underscores, and dots"
            ),
        }
    }
}

impl std::error::Error for IdValidationError {}

fn validate_identifier(s: &str) -> Result<(), IdValidationError> {
    if s.is_empty() {
        return Err(IdValidationError::Empty);
    }
    if s.trim().is_empty() {
        return Err(IdValidationError::WhitespaceOnly);
    }
    if s != s.trim() {
        return Err(IdValidationError::LeadingTrailingWhitespace);
    }
    if !s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(IdValidationError::InvalidCharacters);
    }
    Ok(())
}

/// Unique identifier for an agent in the fleet.
///
/// Use [`AgentId::parse`] to create validated ids. Valid ids are non-empty,
/// carry no surrounding whitespace, and contain only alphanumeric
/// characters, hyphens, underscores, and dots.
///
/// # Examples
///
/// ```
/// use shelfwatch_core::AgentId;
///
/// assert!(AgentId::parse("orchestrator-1").is_ok());
/// assert!(AgentId::parse("").is_err());
/// assert!(AgentId::parse("agent/path").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Parse and validate an agent id from a string.
    pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
        let s = id.as_ref();
        validate_identifier(s)?;
        Ok(Self(s.to_string()))
    }

    /// Get the agent id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentId {
    type Err = IdValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for AgentId {
    /// # Panics
    /// Panics if the string fails validation. For non-panicking
    /// construction, use [`AgentId::parse`] instead.
    fn from(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| panic!("Invalid AgentId '{}': {}", s, e))
    }
}

impl From<String> for AgentId {
    /// # Panics
    /// Panics if the string fails validation. For non-panicking
    /// construction, use [`AgentId::parse`] instead.
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or_else(|e| panic!("Invalid AgentId '{}': {}", s, e))
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared type tag of an agent, used for kind-filtered broadcast.
///
/// Same validation rules as [`AgentId`].
///
/// # Examples
///
/// ```
/// use shelfwatch_core::AgentKind;
///
/// assert!(AgentKind::parse("worker").is_ok());
/// assert!(AgentKind::parse(" reporter").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentKind(String);

impl AgentKind {
    /// Parse and validate an agent kind from a string.
    pub fn parse(kind: impl AsRef<str>) -> Result<Self, IdValidationError> {
        let s = kind.as_ref();
        validate_identifier(s)?;
        Ok(Self(s.to_string()))
    }

    /// Get the kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentKind {
    type Err = IdValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for AgentKind {
    /// # Panics
    /// Panics if the string fails validation. For non-panicking
    /// construction, use [`AgentKind::parse`] instead.
    fn from(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| panic!("Invalid AgentKind '{}': {}", s, e))
    }
}

impl From<String> for AgentKind {
    /// # Panics
    /// Panics if the string fails validation. For non-panicking
    /// construction, use [`AgentKind::parse`] instead.
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or_else(|e| panic!("Invalid AgentKind '{}': {}", s, e))
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_roundtrip() {
        let id = AgentId::parse("orchestrator-1").unwrap();
        assert_eq!(id.as_str(), "orchestrator-1");
        assert_eq!(id.to_string(), "orchestrator-1");
    }

    #[test]
    fn agent_id_rejects_empty() {
        assert_eq!(AgentId::parse(""), Err(IdValidationError::Empty));
    }

    #[test]
    fn agent_id_rejects_whitespace() {
        assert_eq!(AgentId::parse("   "), Err(IdValidationError::WhitespaceOnly));
        assert_eq!(
            AgentId::parse(" agent"),
            Err(IdValidationError::LeadingTrailingWhitespace)
        );
        assert_eq!(
            AgentId::parse("agent "),
            Err(IdValidationError::LeadingTrailingWhitespace)
        );
    }

    #[test]
    fn agent_id_rejects_invalid_characters() {
        assert_eq!(
            AgentId::parse("../agent"),
            Err(IdValidationError::InvalidCharacters)
        );
        assert_eq!(
            AgentId::parse("agent@host"),
            Err(IdValidationError::InvalidCharacters)
        );
        assert_eq!(
            AgentId::parse("agent space"),
            Err(IdValidationError::InvalidCharacters)
        );
    }

    #[test]
    fn agent_id_accepts_dots_dashes_underscores() {
        assert!(AgentId::parse("agent.v2").is_ok());
        assert!(AgentId::parse("agent_b").is_ok());
        assert!(AgentId::parse("AGENT-3").is_ok());
    }

    #[test]
    #[should_panic(expected = "Invalid AgentId")]
    fn agent_id_from_panics_on_empty() {
        let _: AgentId = "".into();
    }

    #[test]
    fn agent_kind_parse() {
        let kind = AgentKind::parse("worker").unwrap();
        assert_eq!(kind.as_str(), "worker");
        assert_eq!(
            AgentKind::parse("kind/sub"),
            Err(IdValidationError::InvalidCharacters)
        );
    }

    #[test]
    fn from_str_trait() {
        assert!("reporter".parse::<AgentKind>().is_ok());
        assert!("".parse::<AgentId>().is_err());
    }
}
