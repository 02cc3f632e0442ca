use std::time::Duration;

/// Limits on in-pool transaction chains.
#[derive(Clone, Debug)]
pub struct MemPoolLimits {
    /// Maximum number of ancestors for a transaction (including itself)
    pub max_ancestors: usize,

    /// Maximum number of descendants for any ancestor (including itself)
    pub max_descendants: usize,
}

impl Default for MemPoolLimits {
    fn default() -> Self {
        Self {
            max_ancestors: 25,
            max_descendants: 25,
        }
    }
}

/// Validity bounds for names and values built by the wallet helpers.
#[derive(Clone, Debug)]
pub struct NameLimits {
    /// Maximum name length in bytes
    pub max_name_length: usize,

    /// Maximum value length in bytes
    pub max_value_length: usize,
}

impl Default for NameLimits {
    fn default() -> Self {
        Self {
            max_name_length: 256,
            max_value_length: 2048,
        }
    }
}

/// Configuration options for the transaction memory pool.
#[derive(Clone, Debug)]
pub struct MemPoolOptions {
    /// Maximum size of the mempool in MB (default: 300)
    pub max_size_mb: usize,

    /// Number of hours to keep transactions in the mempool
    pub expiry_hours: u32,

    /// Whether to audit the name index after bulk removals
    pub check_names: bool,

    pub limits: MemPoolLimits,

    pub name_limits: NameLimits,
}

impl Default for MemPoolOptions {
    fn default() -> Self {
        Self {
            max_size_mb: 300,
            expiry_hours: 336, // 2 weeks
            check_names: false,
            limits: MemPoolLimits::default(),
            name_limits: NameLimits::default(),
        }
    }
}

impl MemPoolOptions {
    /// Create new mempool options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuring mempool options
    pub fn builder() -> MemPoolOptionsBuilder {
        MemPoolOptionsBuilder::default()
    }

    /// Get the maximum size of the mempool in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb as u64 * 1_000_000
    }

    /// Get the expiry duration
    pub fn expiry_duration(&self) -> Duration {
        Duration::from_secs(self.expiry_hours as u64 * 3600)
    }
}

/// Builder pattern for MemPoolOptions
#[derive(Default)]
pub struct MemPoolOptionsBuilder {
    options: MemPoolOptions,
}

impl MemPoolOptionsBuilder {
    /// Set maximum size of the mempool in MB
    pub fn max_size_mb(mut self, size: usize) -> Self {
        self.options.max_size_mb = size;
        self
    }

    /// Set expiry time in hours
    pub fn expiry_hours(mut self, hours: u32) -> Self {
        self.options.expiry_hours = hours;
        self
    }

    /// Enable the name index audit after bulk removals
    pub fn check_names(mut self, check: bool) -> Self {
        self.options.check_names = check;
        self
    }

    /// Set maximum number of ancestors
    pub fn max_ancestors(mut self, count: usize) -> Self {
        self.options.limits.max_ancestors = count;
        self
    }

    /// Set maximum number of descendants
    pub fn max_descendants(mut self, count: usize) -> Self {
        self.options.limits.max_descendants = count;
        self
    }

    /// Set maximum name length
    pub fn max_name_length(mut self, length: usize) -> Self {
        self.options.name_limits.max_name_length = length;
        self
    }

    /// Set maximum value length
    pub fn max_value_length(mut self, length: usize) -> Self {
        self.options.name_limits.max_value_length = length;
        self
    }

    /// Build the final MemPoolOptions
    pub fn build(self) -> MemPoolOptions {
        self.options
    }
}
