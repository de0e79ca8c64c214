//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Page size at which appends roll over to a fresh page.
    ///
    /// A page that has reached this size stops receiving rows; the next
    /// append opens the following page. Rows land whole, so a page may
    /// overshoot the threshold by up to one row.
    pub page_rotation_threshold: u64,

    /// Whether to fsync a page after every append (safer but slower).
    ///
    /// Page rewrites are always durable regardless of this setting; only
    /// plain appends are affected.
    pub sync_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            page_rotation_threshold: 8 * 1024, // 8 KB
            sync_on_write: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the page rotation threshold in bytes.
    #[must_use]
    pub const fn page_rotation_threshold(mut self, size: u64) -> Self {
        self.page_rotation_threshold = size;
        self
    }

    /// Sets whether to fsync after every append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert_eq!(config.page_rotation_threshold, 8192);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .page_rotation_threshold(64);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert_eq!(config.page_rotation_threshold, 64);
    }
}
