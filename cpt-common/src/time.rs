//! Timestamp and report date utilities

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Storage format for report dates (lexically sortable)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted input formats, tried in order
const INPUT_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Parse a caller-supplied report date
///
/// Accepts ISO dates as well as the day-first forms typed into upload forms.
pub fn parse_report_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Report date is empty".to_string()));
    }

    INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| Error::Validation(format!("Unrecognized report date: {}", trimmed)))
}

/// Format a date for storage and range comparison
pub fn format_report_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Reporting period of one weekly report (inclusive on both ends)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReportPeriod {
    /// Build a period, rejecting an end date before the start date
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if end_date < start_date {
            return Err(Error::Validation(format!(
                "End date {} is before start date {}",
                end_date, start_date
            )));
        }
        Ok(Self { start_date, end_date })
    }

    /// Build a period from optional raw form fields
    ///
    /// Both dates are mandatory for weekly uploads and are never inferred
    /// from file content.
    pub fn from_fields(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Validation("Missing start date".to_string()))?;
        let end = end
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Validation("Missing end date".to_string()))?;

        Self::new(parse_report_date(start)?, parse_report_date(end)?)
    }

    pub fn start_key(&self) -> String {
        format_report_date(self.start_date)
    }

    pub fn end_key(&self) -> String {
        format_report_date(self.end_date)
    }
}

/// Optional query range over report periods
///
/// A report is inside the range when it starts on or after `from` and ends
/// on or before `to`. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Parse optional query parameters; blank values are open bounds
    pub fn from_params(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let parse = |raw: Option<&str>| -> Result<Option<NaiveDate>> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => parse_report_date(s).map(Some),
                None => Ok(None),
            }
        };

        let range = Self {
            from: parse(from)?,
            to: parse(to)?,
        };
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if to < from {
                return Err(Error::Validation(format!(
                    "Range end {} is before range start {}",
                    to, from
                )));
            }
        }
        Ok(range)
    }

    pub fn from_key(&self) -> Option<String> {
        self.from.map(format_report_date)
    }

    pub fn to_key(&self) -> Option<String> {
        self.to.map(format_report_date)
    }
}
