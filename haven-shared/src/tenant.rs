//! Tenant identity

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the tenant a unit of work is scoped to
///
/// Only obtainable from a verified token, a tenant row, or explicit
/// construction in trusted code (registration, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// A fresh random tenant id, used when registering a new tenant
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(TenantId::new(id).to_string(), id.to_string());
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(&TenantId::from(id)).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(TenantId::generate(), TenantId::generate());
    }
}
