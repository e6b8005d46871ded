//! Store and mutation configuration.
//!
//! # Responsibility
//! - Describe storage selection and mutation defaults in one value.
//! - Overlay process environment variables onto defaults.
//!
//! # Invariants
//! - A validated config never carries an empty numeric range.
//! - Demo conveniences (default age, sample names) are data, not constants in
//!   service code.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "KINFOLK_DB_PATH";
pub const IN_MEMORY_ENV: &str = "KINFOLK_IN_MEMORY";
pub const CASCADE_DELETE_FAMILY_ENV: &str = "KINFOLK_CASCADE_DELETE_FAMILY";
pub const MEMBER_COUNT_RANGE_ENV: &str = "KINFOLK_MEMBER_COUNT_RANGE";

const DEFAULT_DB_FILE_NAME: &str = "kinfolk.sqlite3";
const DEFAULT_AGE: i64 = 20;
const DEFAULT_SAMPLE_NAMES: [&str; 5] = ["Tom", "Sam", "Joe", "Ann", "Eve"];

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be parsed.
    InvalidEnvValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Range whose lower bound exceeds its upper bound.
    EmptyRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
    /// Sample generation needs at least one name.
    EmptySampleNames,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEnvValue {
                var,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {var}; expected {expected}"),
            Self::EmptyRange { field, min, max } => {
                write!(f, "{field} range is empty: min {min} > max {max}")
            }
            Self::EmptySampleNames => write!(f, "sample_names must not be empty"),
        }
    }
}

impl Error for ConfigError {}

/// How an age is chosen when a person is created without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgePolicy {
    Fixed(i64),
    /// Uniform over `min..=max`.
    Random { min: i64, max: i64 },
}

impl Default for AgePolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_AGE)
    }
}

/// Inclusive member count range for families created without a count.
///
/// Deserializes from a `[min, max]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(u32, u32)")]
pub struct MemberCountRange {
    pub min: u32,
    pub max: u32,
}

impl Default for MemberCountRange {
    fn default() -> Self {
        Self { min: 0, max: 5 }
    }
}

impl From<(u32, u32)> for MemberCountRange {
    fn from((min, max): (u32, u32)) -> Self {
        Self { min, max }
    }
}

/// Complete configuration for opening a store and running mutations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Use a volatile connection instead of a durable file.
    pub in_memory: bool,
    /// Durable store location; `None` resolves to the temp directory.
    pub db_path: Option<PathBuf>,
    /// Detach members instead of refusing to delete a non-empty family.
    pub cascade_delete_family: bool,
    pub default_member_count_range: MemberCountRange,
    pub default_age: AgePolicy,
    pub default_person_name: Option<String>,
    pub sample_names: Vec<String>,
    /// Fixed seed for reproducible sampling; entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            db_path: None,
            cascade_delete_family: false,
            default_member_count_range: MemberCountRange::default(),
            default_age: AgePolicy::default(),
            default_person_name: None,
            sample_names: DEFAULT_SAMPLE_NAMES.iter().map(|name| name.to_string()).collect(),
            rng_seed: None,
        }
    }
}

impl StoreConfig {
    /// Volatile configuration with otherwise default settings.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `KINFOLK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Overlays `KINFOLK_*` environment variables onto `self`.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Overlays values returned by `lookup` for each recognized variable.
    ///
    /// Blank values are ignored. The result is validated.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |var: &str| {
            lookup(var)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = read(DB_PATH_ENV) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(value) = read(IN_MEMORY_ENV) {
            self.in_memory = parse_flag(IN_MEMORY_ENV, &value)?;
        }
        if let Some(value) = read(CASCADE_DELETE_FAMILY_ENV) {
            self.cascade_delete_family = parse_flag(CASCADE_DELETE_FAMILY_ENV, &value)?;
        }
        if let Some(value) = read(MEMBER_COUNT_RANGE_ENV) {
            self.default_member_count_range = parse_count_range(&value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Rejects empty ranges and an empty sample name list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.default_member_count_range;
        if range.min > range.max {
            return Err(ConfigError::EmptyRange {
                field: "default_member_count_range",
                min: i64::from(range.min),
                max: i64::from(range.max),
            });
        }
        if let AgePolicy::Random { min, max } = self.default_age {
            if min > max {
                return Err(ConfigError::EmptyRange {
                    field: "default_age",
                    min,
                    max,
                });
            }
        }
        if self.sample_names.is_empty() {
            return Err(ConfigError::EmptySampleNames);
        }
        Ok(())
    }

    /// Effective durable path for non-memory stores.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvValue {
            var,
            value: value.to_string(),
            expected: "true|false",
        }),
    }
}

fn parse_count_range(value: &str) -> Result<MemberCountRange, ConfigError> {
    let invalid = || ConfigError::InvalidEnvValue {
        var: MEMBER_COUNT_RANGE_ENV,
        value: value.to_string(),
        expected: "<min>-<max>",
    };
    let (min, max) = value.split_once('-').ok_or_else(invalid)?;
    let min = min.trim().parse::<u32>().map_err(|_| invalid())?;
    let max = max.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok(MemberCountRange { min, max })
}

#[cfg(test)]
mod tests {
    use super::{
        AgePolicy, ConfigError, MemberCountRange, StoreConfig, CASCADE_DELETE_FAMILY_ENV,
        DB_PATH_ENV, MEMBER_COUNT_RANGE_ENV,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert!(!config.in_memory);
        assert!(!config.cascade_delete_family);
        assert_eq!(
            config.default_member_count_range,
            MemberCountRange { min: 0, max: 5 }
        );
        assert_eq!(config.default_age, AgePolicy::Fixed(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_apply_recognized_variables() {
        let config = StoreConfig::default()
            .with_overrides(lookup_from(&[
                (DB_PATH_ENV, " /tmp/kinfolk-test.sqlite3 "),
                (CASCADE_DELETE_FAMILY_ENV, "YES"),
                (MEMBER_COUNT_RANGE_ENV, "2-3"),
            ]))
            .expect("overrides should parse");

        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/tmp/kinfolk-test.sqlite3"))
        );
        assert!(config.cascade_delete_family);
        assert_eq!(
            config.default_member_count_range,
            MemberCountRange { min: 2, max: 3 }
        );
    }

    #[test]
    fn overrides_reject_garbage_and_inverted_ranges() {
        let garbage = StoreConfig::default()
            .with_overrides(lookup_from(&[(CASCADE_DELETE_FAMILY_ENV, "maybe")]))
            .unwrap_err();
        assert!(matches!(garbage, ConfigError::InvalidEnvValue { .. }));

        let inverted = StoreConfig::default()
            .with_overrides(lookup_from(&[(MEMBER_COUNT_RANGE_ENV, "5-1")]))
            .unwrap_err();
        assert!(matches!(
            inverted,
            ConfigError::EmptyRange {
                field: "default_member_count_range",
                min: 5,
                max: 1
            }
        ));
    }

    #[test]
    fn blank_override_values_are_ignored() {
        let config = StoreConfig::default()
            .with_overrides(lookup_from(&[(DB_PATH_ENV, "   ")]))
            .unwrap();
        assert_eq!(config.db_path, None);
    }
}
