//! Dictionary configuration.

use memkit_common::{Result, verify_arg};

/// Smallest bucket count a dictionary starts with.
pub const MIN_BUCKETS: usize = 16;

/// Default load factor, in percent, at which the bucket table doubles.
pub const DEFAULT_GROW_AT_PERCENT: u8 = 60;

/// Configuration for dictionary construction.
#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    /// Initial bucket count; rounded up to a power of two, at least
    /// [`MIN_BUCKETS`].
    pub initial_capacity: usize,
    /// The table doubles before an insert once
    /// `len * 100 >= buckets * grow_at_percent`. Valid range is `10..=90`.
    pub grow_at_percent: u8,
    /// Hash seed. When `None`, a seed is derived from the system clock at
    /// build time, so bucket order differs from run to run.
    pub seed: Option<u64>,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: MIN_BUCKETS,
            grow_at_percent: DEFAULT_GROW_AT_PERCENT,
            seed: None,
        }
    }
}

impl DictionaryConfig {
    /// Returns a config with a fixed hash seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Validates the configuration and returns an argument error if invalid.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(grow_at_percent, (10..=90).contains(&self.grow_at_percent));
        verify_arg!(
            initial_capacity,
            self.initial_capacity <= isize::MAX as usize / 2
        );
        Ok(())
    }

    /// Bucket count the dictionary is created with.
    pub fn initial_buckets(&self) -> usize {
        self.initial_capacity.max(MIN_BUCKETS).next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DictionaryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.initial_buckets(), 16);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_initial_buckets_rounding() {
        for (requested, expected) in [(0, 16), (16, 16), (17, 32), (1000, 1024)] {
            let config = DictionaryConfig {
                initial_capacity: requested,
                ..Default::default()
            };
            assert_eq!(config.initial_buckets(), expected);
        }
    }

    #[test]
    fn test_load_factor_bounds() {
        for (percent, valid) in [(9, false), (10, true), (90, true), (91, false)] {
            let config = DictionaryConfig {
                grow_at_percent: percent,
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), valid, "{percent}");
        }
        let config = DictionaryConfig {
            initial_capacity: usize::MAX,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_invalid_arg());
    }
}
