//! # Identity Newtypes
//!
//! UUID-backed identifiers for every record the engine touches. Each is a
//! distinct type; all are valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a recorded transaction. At most one case exists per value.
    TransactionId
);
uuid_identifier!(
    /// Identifier of a bank client (the default aggregation subject).
    ClientId
);
uuid_identifier!(
    /// Identifier of a client account.
    AccountId
);
uuid_identifier!(
    /// Identifier of a compliance case.
    CaseId
);
uuid_identifier!(
    /// Identifier of a single finding attached to a case.
    FindingId
);
uuid_identifier!(
    /// Identifier of a configured compliance rule.
    RuleId
);
uuid_identifier!(
    /// Identifier of a reviewing analyst.
    AnalystId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(CaseId::new(), CaseId::new());
    }

    #[test]
    fn from_uuid_roundtrip() {
        let raw = Uuid::new_v4();
        let id = TransactionId::from_uuid(raw);
        assert_eq!(id.as_uuid(), &raw);
    }

    #[test]
    fn parse_accepts_surrounding_whitespace() {
        let raw = Uuid::new_v4();
        let parsed: AnalystId = format!("  {raw} ").parse().unwrap();
        assert_eq!(parsed, AnalystId::from_uuid(raw));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<RuleId>().is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let raw = Uuid::new_v4();
        let json = serde_json::to_string(&ClientId::from_uuid(raw)).unwrap();
        assert_eq!(json, format!("\"{raw}\""));
    }
}
