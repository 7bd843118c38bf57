use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::encoding::StringEncoding;

pub const MIN_RADIX: u32 = 2;
pub const MAX_RADIX: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExprConfig {
    #[serde(default = "default_radix")]
    pub default_radix: u32,
    #[serde(default)]
    pub encoding: StringEncoding,
    /// Honor backslash escapes inside double-quoted strings.
    #[serde(default)]
    pub escapes_enabled: bool,
}

fn default_radix() -> u32 {
    10
}

impl Default for ExprConfig {
    fn default() -> Self {
        Self {
            default_radix: default_radix(),
            encoding: StringEncoding::default(),
            escapes_enabled: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid default radix {radix}: must be between {MIN_RADIX} and {MAX_RADIX}")]
    InvalidRadix { radix: u32 },
    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid expression config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl ExprConfig {
    pub fn with_radix(radix: u32) -> Result<Self, ConfigError> {
        let config = Self {
            default_radix: radix,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_radix(self.default_radix)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn check_radix(radix: u32) -> Result<(), ConfigError> {
    if (MIN_RADIX..=MAX_RADIX).contains(&radix) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRadix { radix })
    }
}

pub fn load_config(path: &Path) -> Result<ExprConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ExprConfig::from_ron_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ron_with_defaults() {
        let config = ExprConfig::from_ron_str("(default_radix: 16)").expect("config");
        assert_eq!(config.default_radix, 16);
        assert_eq!(config.encoding, StringEncoding::Ascii);
        assert!(!config.escapes_enabled);

        let config =
            ExprConfig::from_ron_str("(encoding: Latin1, escapes_enabled: true)").expect("config");
        assert_eq!(config.default_radix, 10);
        assert_eq!(config.encoding, StringEncoding::Latin1);
        assert!(config.escapes_enabled);
    }

    #[test]
    fn rejects_out_of_range_radix() {
        let err = ExprConfig::from_ron_str("(default_radix: 17)").expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidRadix { radix: 17 }));
        assert!(ExprConfig::with_radix(1).is_err());
        assert!(ExprConfig::with_radix(2).is_ok());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = ExprConfig::from_ron_str("(radix: 8)").expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
