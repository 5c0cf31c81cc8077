//! Registered participants for a single window.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Why a registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Username cannot be empty")]
    EmptyUsername,
    #[error("Username can only contain letters, numbers, and underscores")]
    InvalidCharacters,
    #[error("Username '{0}' already registered")]
    DuplicateUsername(String),
    #[error("Registration is closed")]
    RegistrationClosed,
}

/// Validated participant identity: trimmed, non-empty, `[A-Za-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, RegistrationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RegistrationError::EmptyUsername);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RegistrationError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registrant {
    pub username: Username,
    pub registered_at: DateTime<Utc>,
}

/// Insertion-ordered, duplicate-free set of registrants.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: Vec<Registrant>,
    names: HashSet<Username>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert. Nothing is stored on error.
    pub fn register(
        &mut self,
        raw: &str,
        at: DateTime<Utc>,
    ) -> Result<Registrant, RegistrationError> {
        let username = Username::parse(raw)?;
        if self.names.contains(&username) {
            return Err(RegistrationError::DuplicateUsername(username.0));
        }
        let registrant = Registrant {
            username: username.clone(),
            registered_at: at,
        };
        self.names.insert(username);
        self.entries.push(registrant.clone());
        Ok(registrant)
    }

    pub fn snapshot(&self) -> Vec<Registrant> {
        self.entries.clone()
    }

    pub fn as_slice(&self) -> &[Registrant] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        Username::parse(name)
            .map(|u| self.names.contains(&u))
            .unwrap_or(false)
    }
}
