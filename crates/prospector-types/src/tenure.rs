//! Employment-tenure encoding and the human-format interval parser.
//!
//! Dates are compared as `year2 * 100 + month` with a two-digit year, so
//! `24/4` encodes to 2404. An open-ended interval ("still employed") compares
//! as the maximum value. Unparsable input degrades to the minimum value so
//! that malformed tenure text conservatively fails the recency filter instead
//! of crashing the pipeline.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MonthValue
// ---------------------------------------------------------------------------

/// Integer-comparable (two-digit-year, month) encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct MonthValue(u32);

fn cutoff_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2})/(\d{1,2})").unwrap())
}

impl MonthValue {
    /// The minimum value. Unparsable dates default here.
    pub const MIN: MonthValue = MonthValue(0);

    /// The open-ended "still employed" marker. Compares as the maximum.
    pub const OPEN: MonthValue = MonthValue(999_999);

    /// Encode from a two-digit year and a month.
    pub fn from_parts(year2: u32, month: u32) -> Self {
        MonthValue(year2 * 100 + month)
    }

    /// Parse a `"YY/M"` or `"Present"` string. Anything else yields
    /// [`MonthValue::MIN`], which filters nothing when used as a cutoff.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("present") {
            return MonthValue::OPEN;
        }
        match cutoff_regex().captures(trimmed) {
            Some(caps) => {
                let year2: u32 = caps[1].parse().unwrap_or(0);
                let month: u32 = caps[2].parse().unwrap_or(0);
                MonthValue::from_parts(year2, month)
            }
            None => MonthValue::MIN,
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_open(&self) -> bool {
        *self == MonthValue::OPEN
    }
}

impl fmt::Display for MonthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            write!(f, "Present")
        } else {
            write!(f, "{:02}/{}", self.0 / 100, self.0 % 100)
        }
    }
}

// ---------------------------------------------------------------------------
// TenureInterval
// ---------------------------------------------------------------------------

/// A parsed employment interval. Immutable once constructed.
///
/// `display` carries the normalized `"YY/M-YY/M"` / `"YY/M-Present"` form on
/// parse success, or the cleaned raw text when the grammar did not match —
/// a human-inspectable value is preferred over failing the item outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenureInterval {
    start: MonthValue,
    end: MonthValue,
    display: String,
}

fn interval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4})\.(\d{1,2})\s*-\s*(?:(\d{4})\.(\d{1,2})|(至今))").unwrap()
    })
}

/// Truncate a four-digit year string to its last two digits.
fn year2(s: &str) -> u32 {
    s[s.len() - 2..].parse().unwrap_or(0)
}

impl TenureInterval {
    /// Parse a raw free-text interval such as `（2024.04 - 至今, 1年2月）`.
    ///
    /// Recognized shapes are `YYYY.MM - YYYY.MM` and `YYYY.MM - 至今`,
    /// optionally wrapped in bracket punctuation and followed by a duration
    /// annotation after a comma (ignored). This function is total: input the
    /// grammar rejects produces an interval pinned to [`MonthValue::MIN`].
    pub fn parse(raw: &str) -> Self {
        let cleaned = raw
            .trim()
            .trim_matches(|c| matches!(c, '（' | '）' | '(' | ')'));
        let cleaned = cleaned
            .split([',', '，'])
            .next()
            .unwrap_or(cleaned)
            .trim();

        match interval_regex().captures(cleaned) {
            Some(caps) => {
                let start = MonthValue::from_parts(
                    year2(&caps[1]),
                    caps[2].parse().unwrap_or(0),
                );
                let end = if caps.get(5).is_some() {
                    MonthValue::OPEN
                } else {
                    MonthValue::from_parts(year2(&caps[3]), caps[4].parse().unwrap_or(0))
                };
                let display = format!("{start}-{end}");
                TenureInterval {
                    start,
                    end,
                    display,
                }
            }
            None => TenureInterval {
                start: MonthValue::MIN,
                end: MonthValue::MIN,
                display: cleaned.to_string(),
            },
        }
    }

    pub fn start(&self) -> MonthValue {
        self.start
    }

    pub fn end(&self) -> MonthValue {
        self.end
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_open()
    }

    /// Recency filter: the interval's end must be at or after the cutoff.
    /// An open-ended interval passes any cutoff; a cutoff of
    /// [`MonthValue::OPEN`] passes only still-employed candidates.
    pub fn is_eligible(&self, cutoff: MonthValue) -> bool {
        self.end >= cutoff
    }
}

impl fmt::Display for TenureInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
