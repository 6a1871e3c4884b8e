use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure kinds the HTTP layer needs to tell apart. Everything it does not
/// classify ends up as a server fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store: duplicate entry")]
    Duplicate,

    #[error("store: item not found")]
    NotFound,

    /// A row referenced an id that does not exist (foreign key violation).
    #[error("store: unknown reference")]
    UnknownReference,

    #[error("store: sqlite: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("store: connection lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::QueryReturnedNoRows = err {
            return StoreError::NotFound;
        }

        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return StoreError::Duplicate;
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::UnknownReference,
                    _ => {}
                }
            }
        }

        StoreError::Sqlite(err)
    }
}
