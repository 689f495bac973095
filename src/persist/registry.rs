//! Persist Identifier Registry
//!
//! Process-wide record of claimed persist identifiers, so two handlers never
//! overwrite each other's snapshot.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::error::{MemoError, Result};

/// Registry of claimed identifiers. Claims last for the registry's lifetime.
#[derive(Debug, Default)]
pub struct PersistRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl PersistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Claim ==
    /// Claims `id` for the calling handler.
    ///
    /// # Errors
    /// - [`MemoError::InvalidPersistIdentifier`] if `id` is blank or contains control characters
    /// - [`MemoError::DuplicatePersistIdentifier`] if `id` was claimed before
    pub fn claim(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() || id.chars().any(char::is_control) {
            return Err(MemoError::InvalidPersistIdentifier(id.to_string()));
        }
        if !self.claimed.lock().insert(id.to_string()) {
            return Err(MemoError::DuplicatePersistIdentifier(id.to_string()));
        }
        Ok(())
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claimed.lock().contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_once() {
        let registry = PersistRegistry::new();

        registry.claim("users").unwrap();
        assert!(registry.is_claimed("users"));
        assert!(matches!(
            registry.claim("users"),
            Err(MemoError::DuplicatePersistIdentifier(id)) if id == "users"
        ));
    }

    #[test]
    fn test_invalid_identifiers() {
        let registry = PersistRegistry::new();

        for id in ["", "   ", "a\nb"] {
            assert!(matches!(
                registry.claim(id),
                Err(MemoError::InvalidPersistIdentifier(_))
            ));
        }
        assert!(!registry.is_claimed(""));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = PersistRegistry::new();
        let b = PersistRegistry::new();

        a.claim("users").unwrap();
        b.claim("users").unwrap();
    }
}
