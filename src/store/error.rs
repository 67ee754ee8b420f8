use std::error::Error as StdError;

pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database not initialized")]
    Uninitialized,
    #[error("todo {id} not found")]
    NotFound { id: i64 },
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("storage failure: {0}")]
    Storage(#[source] BoxedCause),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn storage(cause: impl Into<BoxedCause>) -> Self {
        Self::Storage(cause.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::storage(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::storage(value)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::storage(value)
    }
}
