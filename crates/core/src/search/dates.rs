use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::domain::record::CellValue;

/// Textual layouts accepted for date cells, tried in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateLayout {
    /// `YYYY-MM-DD`
    Iso,
    /// `MM/DD/YYYY`
    UsPadded,
    /// `DD.MM.YYYY`
    EuPadded,
    /// `M/D/YYYY`
    Us,
    /// `D.M.YYYY`
    Eu,
}

impl DateLayout {
    pub const ALL: [DateLayout; 5] = [Self::Iso, Self::UsPadded, Self::EuPadded, Self::Us, Self::Eu];

    pub fn render(&self, date: NaiveDate) -> String {
        match self {
            Self::Iso => date.format("%Y-%m-%d").to_string(),
            Self::UsPadded => date.format("%m/%d/%Y").to_string(),
            Self::EuPadded => date.format("%d.%m.%Y").to_string(),
            Self::Us => date.format("%-m/%-d/%Y").to_string(),
            Self::Eu => date.format("%-d.%-m.%Y").to_string(),
        }
    }

    fn pattern(&self) -> &'static Regex {
        static PATTERNS: OnceLock<[Regex; 5]> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            [
                r"^(\d{4})-(\d{2})-(\d{2})$",
                r"^(\d{2})/(\d{2})/(\d{4})$",
                r"^(\d{2})\.(\d{2})\.(\d{4})$",
                r"^(\d{1,2})/(\d{1,2})/(\d{4})$",
                r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$",
            ]
            .map(|pattern| Regex::new(pattern).expect("invalid date layout regex"))
        });

        match self {
            Self::Iso => &patterns[0],
            Self::UsPadded => &patterns[1],
            Self::EuPadded => &patterns[2],
            Self::Us => &patterns[3],
            Self::Eu => &patterns[4],
        }
    }

    /// Strict match followed by a calendar check.
    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        let captures = self.pattern().captures(text)?;
        let part = |index: usize| captures.get(index)?.as_str().parse::<u32>().ok();

        let (year, month, day) = match self {
            Self::Iso => (part(1)?, part(2)?, part(3)?),
            Self::UsPadded | Self::Us => (part(3)?, part(1)?, part(2)?),
            Self::EuPadded | Self::Eu => (part(3)?, part(2)?, part(1)?),
        };

        NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
    }
}

/// Serial numbers accepted as spreadsheet dates.
pub const SERIAL_RANGE: std::ops::Range<f64> = 2.0..100_000.0;

fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Decode a spreadsheet serial day count.
///
/// Uses the 1899-12-30 epoch the ingestion side uses, which inherits the
/// spreadsheet 1900 leap-year quirk: serial 1 lands on 1899-12-31 and serial 60
/// on 1900-02-28 instead of the fictitious 1900-02-29. The fractional part is
/// time of day and is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor() as i64;
    serial_epoch().checked_add_signed(Duration::try_days(days)?)
}

/// Parse a textual date in any supported layout, falling back to a serial
/// number written as text.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) = DateLayout::ALL.iter().find_map(|layout| layout.parse(trimmed)) {
        return Some(date);
    }

    trimmed.parse::<f64>().ok().and_then(parse_serial)
}

pub fn parse_serial(serial: f64) -> Option<NaiveDate> {
    if SERIAL_RANGE.contains(&serial) {
        serial_to_date(serial)
    } else {
        None
    }
}

/// Normalize a cell to a calendar date, or `None` when it is not a date.
pub fn parse_cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Number(value) => parse_serial(*value),
        CellValue::Null | CellValue::Bool(_) => None,
    }
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last representable millisecond of the day; upper date bounds compare
/// against this so the whole "to" day is included.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN))
}
