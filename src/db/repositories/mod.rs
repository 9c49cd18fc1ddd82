pub mod audit;
pub mod case;
pub mod user;

use sea_orm::{DbErr, SqlErr};

/// Marker for an insert or update rejected by a unique index.
#[derive(Debug, thiserror::Error)]
#[error("duplicate value for a unique column")]
pub struct DuplicateKey;

pub(crate) fn map_unique_violation(err: DbErr) -> anyhow::Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        anyhow::Error::new(DuplicateKey)
    } else {
        anyhow::Error::new(err)
    }
}

#[must_use]
pub fn is_duplicate(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DuplicateKey>().is_some()
}
