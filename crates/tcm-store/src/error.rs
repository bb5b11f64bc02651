//! Mapping of `sqlx` failures onto the engine's [`StoreError`].

use tcm_engine::StoreError;

/// Classify a database error. Decoding problems mean the stored data is bad;
/// everything else is treated as the backend being unavailable.
pub fn store_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(format!("{operation}: {err}")),
        _ => StoreError::Unavailable(format!("{operation}: {err}")),
    }
}

/// A stored value that the domain types reject.
pub(crate) fn corrupt(what: &str, id: impl std::fmt::Display, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what} {id}: {detail}"))
}
