//! Write options for archive creation.

use crate::timestamp::TimestampPolicy;

/// Options for writing an archive.
///
/// # Example
///
/// ```rust
/// use ziprepack::timestamp::TimestampPolicy;
/// use ziprepack::write::WriteOptions;
///
/// let options = WriteOptions::new()
///     .timestamp_policy(TimestampPolicy::ShiftedMtime)
///     .compression_level(9);
/// assert_eq!(options.level(), Some(9));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    timestamp_policy: TimestampPolicy,
    compression_level: Option<i64>,
}

impl WriteOptions {
    /// Creates new write options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how entry timestamps are chosen.
    pub fn timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    /// Sets the Deflate level (0-9) for regular files.
    ///
    /// Out-of-range values are clamped.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(i64::from(level.min(9)));
        self
    }

    /// Returns the timestamp policy.
    pub fn policy(&self) -> TimestampPolicy {
        self.timestamp_policy
    }

    /// Returns the configured Deflate level, or `None` for the default.
    pub fn level(&self) -> Option<i64> {
        self.compression_level
    }
}
