//! Warranty coverage arithmetic.
//!
//! Coverage starts one week after the document date and runs for a whole
//! number of calendar months.  Only the terms sold for gear motors (18, 24
//! and 36 months) produce a window; every other input is the valid "not
//! applicable" state and callers omit the expiry line.

use std::fmt;

use chrono::{DateTime, Days, Months, NaiveDate};
use log::debug;

/// Days between the document date and the start of coverage.
pub const COVERAGE_DELAY_DAYS: u64 = 7;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Warranty terms offered for gear motors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarrantyTerm {
    /// 18 months of coverage.
    Months18,
    /// 24 months of coverage.
    Months24,
    /// 36 months of coverage.
    Months36,
}

impl WarrantyTerm {
    /// Maps a month count onto a supported term.
    pub fn from_months(months: u32) -> Option<Self> {
        match months {
            18 => Some(Self::Months18),
            24 => Some(Self::Months24),
            36 => Some(Self::Months36),
            _ => None,
        }
    }

    /// Extracts the leading digits of `raw` (`"24"`, `"24 months"`) and maps
    /// them onto a supported term.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok().and_then(Self::from_months)
    }

    /// Returns the number of months covered by the term.
    pub fn months(self) -> u32 {
        match self {
            Self::Months18 => 18,
            Self::Months24 => 24,
            Self::Months36 => 36,
        }
    }
}

impl fmt::Display for WarrantyTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} months", self.months())
    }
}

/// Whether a coverage window is still running on a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverageStatus {
    /// Coverage has started or is pending and ends in `days_left` days.
    Active {
        /// Whole days until the end date.
        days_left: i64,
    },
    /// The end date has been reached.
    Expired,
}

/// Start and end dates of a warranty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WarrantyWindow {
    start: NaiveDate,
    end: NaiveDate,
    term: WarrantyTerm,
}

impl WarrantyWindow {
    /// Computes the window for a document dated `document_date`.
    ///
    /// Returns `None` only when the dates leave chrono's representable range.
    pub fn from_document_date(document_date: NaiveDate, term: WarrantyTerm) -> Option<Self> {
        let start = document_date.checked_add_days(Days::new(COVERAGE_DELAY_DAYS))?;
        let end = add_months(start, term.months())?;
        Some(Self { start, end, term })
    }

    /// First day of coverage.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of coverage.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Term the window was computed for.
    pub fn term(&self) -> WarrantyTerm {
        self.term
    }

    /// Reports whether the warranty still runs on `today`.
    pub fn status(&self, today: NaiveDate) -> CoverageStatus {
        let days_left = (self.end - today).num_days();
        if days_left > 0 {
            CoverageStatus::Active { days_left }
        } else {
            CoverageStatus::Expired
        }
    }
}

/// Advances `date` by `months` calendar months, clamping the day to the last
/// day of the target month (Jan 31 + 1 month is Feb 28 or 29).
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Parses a document date, accepting ISO dates, `dd-mm-yyyy`, `dd/mm/yyyy`
/// and RFC 3339 timestamps.
pub fn parse_document_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
}

/// Resolves the document date of a record, using `today` when the value is
/// absent or cannot be parsed.
pub fn resolve_document_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_document_date(value).unwrap_or_else(|| {
            debug!("Unparsable document date {:?}; using {}", value, today);
            today
        }),
        None => today,
    }
}

/// Computes the coverage window for a raw document date and raw term.
///
/// This is the single entry point used during rendering: malformed dates fall
/// back to `today`, unsupported terms yield `None`.
pub fn coverage_window(
    document_date: Option<&str>,
    warranty_term: Option<&str>,
    today: NaiveDate,
) -> Option<WarrantyWindow> {
    let term = warranty_term.and_then(WarrantyTerm::parse)?;
    let date = resolve_document_date(document_date, today);
    WarrantyWindow::from_document_date(date, term)
}
