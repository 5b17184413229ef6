//! Date ranges for the admin dashboard charts.
//!
//! A range is either one of the preset windows ending today or a custom
//! `from`..=`to` pair of calendar days. Resolution takes the current time as
//! an argument so it can be tested without a clock.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Errors returned when resolving a dashboard range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("unknown range '{0}'")]
    UnknownOption(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("'from' must not be after 'to'")]
    Inverted,
}

/// Preset dashboard windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeOption {
    #[default]
    Last7Days,
    Last30Days,
    Last90Days,
    Last365Days,
    AllTime,
}

impl RangeOption {
    /// Every preset, in menu order.
    pub const ALL: [Self; 5] = [
        Self::Last7Days,
        Self::Last30Days,
        Self::Last90Days,
        Self::Last365Days,
        Self::AllTime,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Last7Days => "Last 7 days",
            Self::Last30Days => "Last 30 days",
            Self::Last90Days => "Last 90 days",
            Self::Last365Days => "Last 365 days",
            Self::AllTime => "All time",
        }
    }

    /// Number of calendar days covered, today included. `None` for all time.
    #[must_use]
    pub const fn days(self) -> Option<u64> {
        match self {
            Self::Last7Days => Some(7),
            Self::Last30Days => Some(30),
            Self::Last90Days => Some(90),
            Self::Last365Days => Some(365),
            Self::AllTime => None,
        }
    }

    /// Resolve against the current time.
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> DateRange {
        let start = self.days().and_then(|days| {
            now.date_naive()
                .checked_sub_days(Days::new(days - 1))
                .map(start_of_day)
        });
        DateRange {
            label: self.label().to_owned(),
            start,
            end: None,
        }
    }
}

impl std::str::FromStr for RangeOption {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_7_days" => Ok(Self::Last7Days),
            "last_30_days" => Ok(Self::Last30Days),
            "last_90_days" => Ok(Self::Last90Days),
            "last_365_days" => Ok(Self::Last365Days),
            "all_time" => Ok(Self::AllTime),
            other => Err(RangeError::UnknownOption(other.to_owned())),
        }
    }
}

/// A resolved window. `start` is inclusive, `end` exclusive; `None` means
/// unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub label: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Resolve dashboard query parameters.
    ///
    /// A named `range` wins. Otherwise `from` and `to` (both `YYYY-MM-DD`)
    /// select whole days, `to` included. With neither, the default preset
    /// applies.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] for unknown presets, unparseable dates, or a
    /// `from` later than `to`.
    pub fn from_params(
        range: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, RangeError> {
        if let Some(range) = range.filter(|r| !r.is_empty()) {
            return Ok(range.parse::<RangeOption>()?.resolve(now));
        }
        match (from, to) {
            (Some(from), Some(to)) => Self::custom(parse_day(from)?, parse_day(to)?),
            _ => Ok(RangeOption::default().resolve(now)),
        }
    }

    /// Whole days `from` through `to`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Inverted`] if `from > to`.
    pub fn custom(from: NaiveDate, to: NaiveDate) -> Result<Self, RangeError> {
        if from > to {
            return Err(RangeError::Inverted);
        }
        Ok(Self {
            label: format!("{} - {}", from.format("%d %b %Y"), to.format("%d %b %Y")),
            start: Some(start_of_day(from)),
            end: to.checked_add_days(Days::new(1)).map(start_of_day),
        })
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at < end)
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| RangeError::InvalidDate(raw.to_owned()))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}
