//! Blob configuration.

/// Configuration for opening a blob.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Whether to open the blob read-only.
    pub read_only: bool,

    /// Whether to create the blob file if it doesn't exist.
    ///
    /// Ignored for read-only opens, which always require an existing file.
    pub create_if_missing: bool,

    /// Whether to fsync on every commit (safer but slower).
    ///
    /// Disabling this gives up the crash-consistency guarantee in exchange
    /// for bulk-load throughput; the marker is still written in order, but
    /// the OS may reorder the underlying disk writes.
    pub sync_on_commit: bool,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl BlobConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to open the blob read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether to create the blob file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
