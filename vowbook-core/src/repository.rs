/// Error type returned by storage adapters. Services translate it into
/// `CoreError::Internal`.
pub type RepoError = Box<dyn std::error::Error + Send + Sync>;

pub type RepoResult<T> = Result<T, RepoError>;

/// Result of a version-checked (optimistic) write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The stored version no longer matches the expected one; reload and retry.
    VersionConflict,
}
