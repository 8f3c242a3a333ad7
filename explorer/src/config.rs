//! Explorer configuration module.
//!
//! This module provides configuration loading for the explorer binary from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `EXPLORER_ORDER`: B-tree order, at least 3 (default: `3`)
//! - `EXPLORER_SPEED`: Playback speed multiplier (default: `1`)
//! - `EXPLORER_VIEWPORT_WIDTH`: Width used for layout (default: `800`)
//! - `EXPLORER_DELETE_POLICY`: `simplified` or `rebalance` (default: `simplified`)
//! - `EXPLORER_SEED`: Seed for random inserts (default: `42`)
//! - `EXPLORER_OUTPUT`: `json` or `text` (default: `json`)
//! - `EXPLORER_SKIP_DELAYS`: `true` to play narrations without pausing (default: `false`)
//!
//! # Invariants
//!
//! - `order` is always at least [`MIN_ORDER`]
//! - `viewport_width` always leaves room inside both side margins

use crate::btree::{DeletePolicy, MIN_ORDER, Order};
use crate::layout::SIDE_MARGIN;
use crate::narration::Speed;
use crate::output::OutputFormat;

/// Explorer configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` every field holds a validated value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    pub order: Order,
    pub speed: Speed,
    /// Width of the drawing area handed to the layout engine.
    pub viewport_width: f64,
    pub delete_policy: DeletePolicy,
    /// Seed for the random workload behind `random` requests.
    pub seed: u64,
    pub output: OutputFormat,
    pub skip_delays: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self::InvalidValue { name, message } = self;
        write!(f, "invalid value for {name}: {message}")
    }
}

impl std::error::Error for ConfigError {}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            order: Order::DEFAULT,
            speed: Speed::NORMAL,
            viewport_width: Self::DEFAULT_VIEWPORT_WIDTH,
            delete_policy: DeletePolicy::default(),
            seed: Self::DEFAULT_SEED,
            output: OutputFormat::default(),
            skip_delays: false,
        }
    }
}

impl ExplorerConfig {
    pub const DEFAULT_VIEWPORT_WIDTH: f64 = 800.0;
    pub const DEFAULT_SEED: u64 = 42;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to a value that does not
    /// parse or is out of range. Unset variables take their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            order: Self::load_order(&lookup)?.unwrap_or(defaults.order),
            speed: Self::load_speed(&lookup)?.unwrap_or(defaults.speed),
            viewport_width: Self::load_viewport_width(&lookup)?
                .unwrap_or(defaults.viewport_width),
            delete_policy: Self::load_named(
                &lookup,
                "EXPLORER_DELETE_POLICY",
                DeletePolicy::parse,
                "simplified or rebalance",
            )?
            .unwrap_or(defaults.delete_policy),
            seed: Self::load_parsed(&lookup, "EXPLORER_SEED", "an unsigned integer")?
                .unwrap_or(defaults.seed),
            output: Self::load_named(&lookup, "EXPLORER_OUTPUT", OutputFormat::parse, "json or text")?
                .unwrap_or(defaults.output),
            skip_delays: Self::load_parsed(&lookup, "EXPLORER_SKIP_DELAYS", "true or false")?
                .unwrap_or(defaults.skip_delays),
        })
    }

    fn load_order<F>(lookup: &F) -> Result<Option<Order>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) = Self::load_parsed::<usize, _>(lookup, "EXPLORER_ORDER", "an integer")?
        else {
            return Ok(None);
        };
        Order::new(value)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "EXPLORER_ORDER".to_string(),
                message: format!("{value} is below the minimum order {MIN_ORDER}"),
            })
    }

    fn load_speed<F>(lookup: &F) -> Result<Option<Speed>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) = Self::load_parsed::<f64, _>(lookup, "EXPLORER_SPEED", "a number")? else {
            return Ok(None);
        };
        Speed::new(value)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "EXPLORER_SPEED".to_string(),
                message: format!(
                    "{value} is outside {}..={}",
                    Speed::MIN,
                    Speed::MAX
                ),
            })
    }

    fn load_viewport_width<F>(lookup: &F) -> Result<Option<f64>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) =
            Self::load_parsed::<f64, _>(lookup, "EXPLORER_VIEWPORT_WIDTH", "a number")?
        else {
            return Ok(None);
        };
        if value.is_finite() && value > 2.0 * SIDE_MARGIN {
            Ok(Some(value))
        } else {
            Err(ConfigError::InvalidValue {
                name: "EXPLORER_VIEWPORT_WIDTH".to_string(),
                message: format!("{value} must be greater than {}", 2.0 * SIDE_MARGIN),
            })
        }
    }

    /// Parse an optional variable with `FromStr`.
    fn load_parsed<T, F>(
        lookup: &F,
        name: &str,
        expected: &str,
    ) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        F: Fn(&str) -> Option<String>,
    {
        lookup(name)
            .map(|value| {
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("'{value}' is not {expected}"),
                })
            })
            .transpose()
    }

    /// Parse an optional variable with a name-to-value function.
    fn load_named<T, F>(
        lookup: &F,
        name: &str,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(name)
            .map(|value| {
                parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("'{value}' is not {expected}"),
                })
            })
            .transpose()
    }
}
