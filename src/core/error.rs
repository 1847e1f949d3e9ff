use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Savepoint error: {0}")]
    Savepoint(#[from] redb::SavepointError),

    #[error("Directory listing error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    /// A synchronization run failed and its writes were rolled back.
    #[error("Synchronization aborted, index restored: {0}")]
    SyncAborted(String),
}

impl Error {
    pub fn is_sync_aborted(&self) -> bool {
        matches!(self, Error::SyncAborted(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
