//! Output size variants.
//!
//! A size is written `suffix:size`, e.g. `_sm:50`. The suffix is appended to the
//! source's base name; the size bounds the longer edge of the output, with `0`
//! meaning the image keeps its dimensions.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SizeSpec {
    suffix: String,
    max_dimension: u32,
}

impl SizeSpec {
    pub fn new(suffix: impl Into<String>, max_dimension: u32) -> Result<Self, ConfigError> {
        let suffix = suffix.into();
        if suffix.chars().any(char::is_control) {
            return Err(ConfigError::InvalidSize {
                input: suffix.escape_debug().to_string(),
                reason: "suffix must not contain control characters".to_string(),
            });
        }
        Ok(Self {
            suffix,
            max_dimension,
        })
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// True when outputs of this size keep the source dimensions.
    pub fn is_passthrough(&self) -> bool {
        self.max_dimension == 0
    }
}

impl FromStr for SizeSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidSize {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (suffix, size) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected `suffix:size`"))?;
        let max_dimension = size
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid("size must be a non-negative integer"))?;

        SizeSpec::new(suffix, max_dimension)
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.suffix, self.max_dimension)
    }
}

/// Parse a comma-separated list such as `_sm:50,_lg:0`, keeping its order.
pub fn parse_size_list(list: &str) -> Result<Vec<SizeSpec>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .map(|entry| {
            if entry.is_empty() {
                Err(ConfigError::InvalidSize {
                    input: list.to_string(),
                    reason: "empty entry in size list".to_string(),
                })
            } else {
                entry.parse()
            }
        })
        .collect()
}
