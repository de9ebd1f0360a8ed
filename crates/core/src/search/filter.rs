use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::record::LooseRecord;
use crate::search::dates::{end_of_day, parse_cell_date, parse_date_text, start_of_day};
use crate::search::fields::{LogicalField, ResolvedColumns};

#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    /// Case-insensitive substring of the cell's display text.
    Contains { field: LogicalField, needle: String },
    /// Inclusive date range; either bound may be open.
    DateRange { field: LogicalField, from: Option<NaiveDate>, to: Option<NaiveDate> },
    /// Inclusive numeric range; either bound may be open.
    NumberRange { field: LogicalField, min: Option<f64>, max: Option<f64> },
}

impl Criterion {
    pub fn field(&self) -> LogicalField {
        match self {
            Self::Contains { field, .. }
            | Self::DateRange { field, .. }
            | Self::NumberRange { field, .. } => *field,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Contains { field, needle } => format!("{} contains \"{needle}\"", field.key()),
            Self::DateRange { field, from, to } => format!(
                "{} in [{}, {}]",
                field.key(),
                from.map(|d| d.to_string()).unwrap_or_else(|| "*".to_string()),
                to.map(|d| d.to_string()).unwrap_or_else(|| "*".to_string()),
            ),
            Self::NumberRange { field, min, max } => format!(
                "{} in [{}, {}]",
                field.key(),
                min.map(|n| n.to_string()).unwrap_or_else(|| "*".to_string()),
                max.map(|n| n.to_string()).unwrap_or_else(|| "*".to_string()),
            ),
        }
    }

    /// Evaluate against the resolved column of one record. A missing or
    /// unparseable cell never satisfies the criterion.
    pub fn matches(&self, record: &LooseRecord, column: &str) -> bool {
        let Some(cell) = record.get(column) else {
            return false;
        };

        match self {
            Self::Contains { needle, .. } => cell
                .display_text()
                .map(|text| text.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Self::DateRange { from, to, .. } => {
                let Some(date) = parse_cell_date(cell) else {
                    return false;
                };
                let at = start_of_day(date);
                from.map_or(true, |from| at >= start_of_day(from))
                    && to.map_or(true, |to| at <= end_of_day(to))
            }
            Self::NumberRange { min, max, .. } => {
                let Some(value) = cell.as_number() else {
                    return false;
                };
                min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
            }
        }
    }
}

/// A criterion bound that could not be interpreted and was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredBound {
    pub field: &'static str,
    pub value: String,
}

/// Before/after counts for one applied filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStep {
    pub label: String,
    pub column: String,
    pub before: usize,
    pub after: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FilterOutcome {
    pub records: Vec<LooseRecord>,
    pub steps: Vec<FilterStep>,
}

/// Sparse AND-combined criteria built from optional search arguments.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    criteria: Vec<Criterion>,
    ignored: Vec<IgnoredBound>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, criterion: Criterion) {
        self.criteria.push(criterion);
    }

    /// Adds a substring criterion when `needle` is present and non-blank.
    pub fn contains(mut self, field: LogicalField, needle: Option<&str>) -> Self {
        if let Some(needle) = needle.map(str::trim).filter(|value| !value.is_empty()) {
            self.push(Criterion::Contains { field, needle: needle.to_string() });
        }
        self
    }

    /// Adds a date range when at least one bound parses. Unparseable bounds are
    /// dropped and reported rather than failing the search.
    pub fn date_range(mut self, field: LogicalField, from: Option<&str>, to: Option<&str>) -> Self {
        let from = self.parse_bound(field, from);
        let to = self.parse_bound(field, to);
        if from.is_some() || to.is_some() {
            self.push(Criterion::DateRange { field, from, to });
        }
        self
    }

    pub fn number_range(mut self, field: LogicalField, min: Option<f64>, max: Option<f64>) -> Self {
        if min.is_some() || max.is_some() {
            self.push(Criterion::NumberRange { field, min, max });
        }
        self
    }

    fn parse_bound(&mut self, field: LogicalField, raw: Option<&str>) -> Option<NaiveDate> {
        let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
        let parsed = parse_date_text(raw);
        if parsed.is_none() {
            tracing::warn!(
                event_name = "search.date_bound_ignored",
                field = field.key(),
                value = raw,
                "date bound could not be parsed and is ignored"
            );
            self.ignored.push(IgnoredBound { field: field.key(), value: raw.to_string() });
        }
        parsed
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn ignored_bounds(&self) -> &[IgnoredBound] {
        &self.ignored
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Distinct logical fields the criteria reference, in insertion order.
    pub fn fields(&self) -> Vec<LogicalField> {
        let mut fields = Vec::new();
        for criterion in &self.criteria {
            if !fields.contains(&criterion.field()) {
                fields.push(criterion.field());
            }
        }
        fields
    }

    /// Run every criterion whose field resolved. Criteria on unresolved fields
    /// are skipped so a renamed column degrades one filter, not the search.
    pub fn apply(&self, records: Vec<LooseRecord>, columns: &ResolvedColumns) -> FilterOutcome {
        let mut remaining = records;
        let mut steps = Vec::with_capacity(self.criteria.len());

        for criterion in &self.criteria {
            let Some(column) = columns.column(criterion.field()) else {
                continue;
            };

            let before = remaining.len();
            remaining.retain(|record| criterion.matches(record, column));
            let step = FilterStep {
                label: criterion.label(),
                column: column.to_string(),
                before,
                after: remaining.len(),
            };
            tracing::debug!(
                event_name = "search.filter_applied",
                filter = %step.label,
                column = %step.column,
                before = step.before,
                after = step.after,
                "filter applied"
            );
            steps.push(step);
        }

        FilterOutcome { records: remaining, steps }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Criterion, FilterSet};
    use crate::domain::record::{CellValue, LooseRecord};
    use crate::search::fields::{LogicalField, ResolvedColumns};

    fn order(index: usize, supplier: &str, date: impl Into<CellValue>) -> LooseRecord {
        LooseRecord::new(index).with_field("Supplier Name", supplier).with_field("Order Date", date)
    }

    fn columns(filters: &FilterSet, records: &[LooseRecord]) -> ResolvedColumns {
        let headers = records.first().map(|r| r.headers().collect::<Vec<_>>()).unwrap_or_default();
        ResolvedColumns::resolve(&filters.fields(), &headers)
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let records = vec![order(0, "Huolto-Karhu Oy", "2024-01-05"), order(1, "TechCorp", "2024-01-06")];
        let filters = FilterSet::new().contains(LogicalField::SupplierName, Some("huolto"));
        let resolved = columns(&filters, &records);

        let outcome = filters.apply(records, &resolved);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].row_index, 0);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!((outcome.steps[0].before, outcome.steps[0].after), (2, 1));
    }

    #[test]
    fn no_criteria_passes_everything() {
        let records = vec![order(0, "A", "2024-01-05"), order(1, "B", CellValue::Null)];
        let filters = FilterSet::new().contains(LogicalField::SupplierName, Some("   "));
        assert!(filters.is_empty());

        let outcome = filters.apply(records, &ResolvedColumns::default());
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.steps.is_empty());
    }

    #[test]
    fn date_upper_bound_includes_the_whole_day() {
        let records = vec![
            order(0, "A", "2024-05-31"),
            order(1, "B", "06/01/2024"),
            order(2, "C", CellValue::Number(45443.0)),
        ];
        let filters =
            FilterSet::new().date_range(LogicalField::OrderDate, Some("1.5.2024"), Some("2024-05-31"));
        let resolved = columns(&filters, &records);

        let outcome = filters.apply(records, &resolved);

        // 45443 is 2024-05-31 as a spreadsheet serial.
        let rows: Vec<_> = outcome.records.iter().map(|r| r.row_index).collect();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn null_dates_never_match_a_date_range() {
        let records = vec![order(0, "A", CellValue::Null), order(1, "B", "not a date")];
        let filters = FilterSet::new().date_range(LogicalField::OrderDate, Some("2000-01-01"), None);
        let resolved = columns(&filters, &records);

        assert!(filters.apply(records, &resolved).records.is_empty());
    }

    #[test]
    fn unparseable_bounds_are_dropped_and_reported() {
        let filters = FilterSet::new().date_range(LogicalField::OrderDate, Some("last tuesday"), None);
        assert!(filters.is_empty());
        assert_eq!(filters.ignored_bounds().len(), 1);
        assert_eq!(filters.ignored_bounds()[0].value, "last tuesday");
    }

    #[test]
    fn criteria_on_unresolved_columns_are_skipped() {
        let records = vec![order(0, "A", "2024-01-01"), order(1, "B", "2024-01-02")];
        let filters = FilterSet::new()
            .contains(LogicalField::BuyerName, Some("Maija"))
            .contains(LogicalField::SupplierName, Some("a"));
        let resolved = columns(&filters, &records);

        let outcome = filters.apply(records, &resolved);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(resolved.unresolved()[0].field, "buyerName");
    }

    #[test]
    fn number_range_is_inclusive() {
        let records = vec![
            LooseRecord::new(0).with_field("Unit Price", 10.0),
            LooseRecord::new(1).with_field("Unit Price", "25,5"),
            LooseRecord::new(2).with_field("Unit Price", 30.0),
            LooseRecord::new(3).with_field("Unit Price", "call us"),
        ];
        let filters = FilterSet::new().number_range(LogicalField::UnitPrice, Some(10.0), Some(25.5));
        let resolved = columns(&filters, &records);

        let rows: Vec<_> = filters.apply(records, &resolved).records.iter().map(|r| r.row_index).collect();
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn returned_records_satisfy_every_criterion() {
        let records: Vec<_> = (0..40)
            .map(|i| {
                let supplier = if i % 3 == 0 { "Huolto-Karhu Oy" } else { "TechCorp" };
                let day = NaiveDate::from_ymd_opt(2024, 1, 1 + (i % 28) as u32).expect("date");
                order(i, supplier, day.format("%d.%m.%Y").to_string())
            })
            .collect();
        let filters = FilterSet::new()
            .contains(LogicalField::SupplierName, Some("karhu"))
            .date_range(LogicalField::OrderDate, Some("2024-01-10"), Some("2024-01-20"));
        let resolved = columns(&filters, &records);

        let outcome = filters.apply(records.clone(), &resolved);

        assert!(!outcome.records.is_empty());
        for record in &outcome.records {
            assert!(records.contains(record));
            for criterion in filters.criteria() {
                let column = resolved.column(criterion.field()).expect("resolved");
                assert!(criterion.matches(record, column), "{}", criterion.label());
            }
        }
        let excluded = records.len() - outcome.records.len();
        assert!(excluded > 0);
        assert!(matches!(filters.criteria()[0], Criterion::Contains { .. }));
    }
}
