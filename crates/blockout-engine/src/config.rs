//! Engine configuration.
//!
//! Read from an optional TOML file, then overridden from the environment:
//!
//! - `BLOCKOUTS_TIMEZONE`: IANA timezone all blockouts are normalized to
//! - `BLOCKOUTS_WEEK_START`: `monday` | `sunday`
//!
//! ```toml
//! timezone = "America/New_York"
//! week_start = "sunday"
//! pad_to_weeks = true
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{BlockoutError, Result};
use crate::window::{VisibleWindow, WeekStartDay};

pub const TIMEZONE_ENV: &str = "BLOCKOUTS_TIMEZONE";
pub const WEEK_START_ENV: &str = "BLOCKOUTS_WEEK_START";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// The single timezone every blockout instant is expressed in.
    pub timezone: String,
    pub week_start: WeekStartDay,
    /// Pad month windows out to whole weeks, as a calendar grid shows them.
    pub pad_to_weeks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timezone: "UTC".to_string(),
            week_start: WeekStartDay::Monday,
            pad_to_weeks: false,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidConfig`] for malformed TOML or unknown
    /// keys, or [`BlockoutError::InvalidTimezone`] for a bad zone name.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| BlockoutError::InvalidConfig(e.to_string()))?;
        config.tz()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockoutError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        EngineConfig::from_toml_str(&text)
    }

    /// File (if given) or defaults, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => EngineConfig::from_path(p)?,
            None => EngineConfig::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tz) = lookup(TIMEZONE_ENV) {
            self.timezone = tz;
        }
        if let Some(ws) = lookup(WEEK_START_ENV) {
            self.week_start = match ws.trim().to_lowercase().as_str() {
                "monday" | "mon" => WeekStartDay::Monday,
                "sunday" | "sun" => WeekStartDay::Sunday,
                other => {
                    return Err(BlockoutError::InvalidConfig(format!(
                        "{WEEK_START_ENV} must be monday or sunday, got '{other}'"
                    )))
                }
            };
        }
        self.tz()?;
        Ok(self)
    }

    /// The configured zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| BlockoutError::InvalidTimezone(format!("'{}'", self.timezone)))
    }

    /// The calendar date `now` falls on in the configured zone.
    pub fn today(&self, now: DateTime<Utc>) -> Result<NaiveDate> {
        Ok(now.with_timezone(&self.tz()?).date_naive())
    }

    /// The window for the month containing `date`, padded if configured.
    pub fn month_window(&self, date: NaiveDate) -> Result<VisibleWindow> {
        if self.pad_to_weeks {
            VisibleWindow::month_grid(date.year(), date.month(), self.week_start)
        } else {
            VisibleWindow::containing_month(date)
        }
    }

    /// The window to show first: the month containing `now`.
    pub fn initial_window(&self, now: DateTime<Utc>) -> Result<VisibleWindow> {
        self.month_window(self.today(now)?)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
