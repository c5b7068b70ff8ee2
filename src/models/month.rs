use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, displayed and parsed as `YYYY-MM`.
///
/// Ordering is chronological. The month key of a canonical `YYYY-MM-DD` date
/// is exactly its first seven characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && NaiveDate::from_ymd_opt(year, month, 1).is_some() {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding calendar month
    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(&self) -> u32 {
        self.succ()
            .first_day()
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            .unwrap_or(31)
    }

    /// Number of calendar months from `self` to `other` inclusive (0 if `other` is earlier).
    pub fn count_through(self, other: Month) -> usize {
        let diff = (other.year - self.year) as i64 * 12 + other.month as i64 - self.month as i64;
        if diff < 0 {
            0
        } else {
            diff as usize + 1
        }
    }

    /// Iterate every month from `from` to `to` inclusive
    pub fn range_inclusive(from: Month, to: Month) -> impl Iterator<Item = Month> {
        let count = from.count_through(to);
        std::iter::successors(Some(from), |m| Some(m.succ())).take(count)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date (only the month is kept).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.len() {
            7 => {
                let (year, month) = s
                    .split_once('-')
                    .ok_or_else(|| format!("invalid month '{}'", s))?;
                let year: i32 = year
                    .parse()
                    .map_err(|_| format!("invalid year in '{}'", s))?;
                let month: u32 = month
                    .parse()
                    .map_err(|_| format!("invalid month in '{}'", s))?;
                Month::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
            }
            10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Month::from_date)
                .map_err(|_| format!("invalid date '{}'", s)),
            _ => Err(format!("invalid month '{}'", s)),
        }
    }
}

impl TryFrom<String> for Month {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.to_string()
    }
}
