use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::utils;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortState {
    #[default]
    None,
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Some(Self::Ascending),
            "descending" | "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

impl From<SortDirection> for SortState {
    fn from(dir: SortDirection) -> Self {
        match dir {
            SortDirection::Ascending => SortState::Ascending,
            SortDirection::Descending => SortState::Descending,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    To(SortDirection),
    ResetToDefault,
}

/// none → descending → ascending → back to the table default.
pub fn next_sort_state(current: SortState) -> Transition {
    match current {
        SortState::None => Transition::To(SortDirection::Descending),
        SortState::Descending => Transition::To(SortDirection::Ascending),
        SortState::Ascending => Transition::ResetToDefault,
    }
}

/// Header title describing what the next click will do.
pub fn header_title(state: SortState) -> &'static str {
    match state {
        SortState::None => "Sort highest first",
        SortState::Descending => "Sort lowest first",
        SortState::Ascending => "Cancel sorting",
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortValue {
    Number(f64),
    NotApplicable,
}

impl SortValue {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.and_then(utils::parse_leading_float) {
            Some(n) => Self::Number(n),
            None => Self::NotApplicable,
        }
    }
}

/// Numeric order in `dir`; not-applicable values sink to the end either way.
pub fn compare_values(a: SortValue, b: SortValue, dir: SortDirection) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match dir {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        }
        (SortValue::Number(_), SortValue::NotApplicable) => Ordering::Less,
        (SortValue::NotApplicable, SortValue::Number(_)) => Ordering::Greater,
        (SortValue::NotApplicable, SortValue::NotApplicable) => Ordering::Equal,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Column {
    pub label: String,
    pub sortable: bool,
    /// Named sort target; when set, values come from the row's matching
    /// section rather than the cell in this column's position.
    pub section: Option<String>,
    /// Field name used by the list's sort select.
    pub field: Option<String>,
    pub default: Option<SortDirection>,
    pub state: SortState,
}

impl Column {
    pub fn title(&self) -> &'static str {
        header_title(self.state)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Row {
    /// Document order when the table was read.
    pub position: usize,
    pub label: String,
    #[serde(skip)]
    pub html: String,
    pub cells: Vec<Option<String>>,
    pub sections: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SortableTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl SortableTable {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn active(&self) -> Option<(usize, SortState)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.state != SortState::None)
            .map(|(i, c)| (i, c.state))
    }

    fn declared_default(&self) -> Option<(usize, SortDirection)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.default.map(|d| (i, d)))
    }

    fn raw_value<'a>(&self, row: &'a Row, column: usize) -> Option<&'a str> {
        match self.columns.get(column).and_then(|c| c.section.as_deref()) {
            Some(section) => row.sections.get(section).map(String::as_str),
            None => row.cells.get(column).and_then(|c| c.as_deref()),
        }
    }

    /// Handles a click on header `column`. Clicks on unknown or
    /// non-sortable headers are ignored and return false.
    pub fn click(&mut self, column: usize) -> bool {
        let Some(col) = self.columns.get(column) else {
            return false;
        };
        if !col.sortable {
            return false;
        }
        match next_sort_state(col.state) {
            Transition::To(dir) => self.sort_by_column(column, dir),
            Transition::ResetToDefault => self.reset(),
        }
        true
    }

    pub fn sort_by_column(&mut self, column: usize, dir: SortDirection) {
        for c in self.columns.iter_mut() {
            c.state = SortState::None;
        }
        if let Some(c) = self.columns.get_mut(column) {
            c.state = dir.into();
        }
        let mut keyed: Vec<(SortValue, Row)> = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| (SortValue::parse(self.raw_value(&row, column)), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_values(*a, *b, dir));
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    /// Returns to the declared default sort, or to document order when
    /// the table declares none.
    pub fn reset(&mut self) {
        match self.declared_default() {
            Some((column, dir)) => self.sort_by_column(column, dir),
            None => {
                for c in self.columns.iter_mut() {
                    c.state = SortState::None;
                }
                self.rows.sort_by_key(|r| r.position);
            }
        }
    }

    /// Sorts by a select value such as `population` or `-population`.
    /// Numeric pairs compare numerically, anything else lexically, and
    /// rows whose value is `0` always end up at the bottom.
    pub fn sort_by_field(&mut self, order: &str) -> bool {
        let (field, descending) = match order.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (order, false),
        };
        let Some(column) = self
            .columns
            .iter()
            .position(|c| c.field.as_deref() == Some(field))
        else {
            return false;
        };
        let value = |row: &Row| -> String {
            row.cells
                .get(column)
                .and_then(|c| c.clone())
                .unwrap_or_default()
        };
        let mut rows = std::mem::take(&mut self.rows);
        rows.sort_by(|a, b| compare_cells(&value(a), &value(b)));
        if descending {
            rows.reverse();
        }
        let (zeros, rest): (Vec<Row>, Vec<Row>) = rows.into_iter().partition(|r| value(r) == "0");
        self.rows = rest.into_iter().chain(zeros).collect();
        true
    }

    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.label.clone()).collect()
    }

    pub fn render_rows(&self) -> String {
        self.rows
            .iter()
            .map(|r| r.html.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn strict_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    match (strict_number(a), strict_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(position: usize, label: &str, cells: &[&str]) -> Row {
        Row {
            position,
            label: label.to_string(),
            html: format!("<tr><td>{label}</td></tr>"),
            cells: cells.iter().map(|c| Some(c.to_string())).collect(),
            sections: HashMap::new(),
        }
    }

    fn column(label: &str, sortable: bool) -> Column {
        Column {
            label: label.to_string(),
            sortable,
            ..Default::default()
        }
    }

    fn score_table() -> SortableTable {
        let values = ["10", "NA", "3", "NA", "7"];
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| row(i, &format!("r{i}:{v}"), &["name", v]))
            .collect();
        SortableTable::new(vec![column("Council", false), column("Score", true)], rows)
    }

    fn sorted_values(table: &SortableTable) -> Vec<String> {
        table
            .rows
            .iter()
            .map(|r| r.cells[1].clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn transitions_follow_none_desc_asc_reset() {
        assert_eq!(
            next_sort_state(SortState::None),
            Transition::To(SortDirection::Descending)
        );
        assert_eq!(
            next_sort_state(SortState::Descending),
            Transition::To(SortDirection::Ascending)
        );
        assert_eq!(next_sort_state(SortState::Ascending), Transition::ResetToDefault);
    }

    #[test]
    fn descending_puts_not_applicable_last() {
        let mut table = score_table();
        assert!(table.click(1));
        assert_eq!(table.columns[1].state, SortState::Descending);
        assert_eq!(sorted_values(&table), vec!["10", "7", "3", "NA", "NA"]);
    }

    #[test]
    fn ascending_still_puts_not_applicable_last() {
        let mut table = score_table();
        table.click(1);
        table.click(1);
        assert_eq!(table.columns[1].state, SortState::Ascending);
        assert_eq!(sorted_values(&table), vec!["3", "7", "10", "NA", "NA"]);
    }

    #[test]
    fn third_click_without_default_restores_document_order() {
        let mut table = score_table();
        table.click(1);
        table.click(1);
        table.click(1);
        assert!(table.active().is_none());
        assert_eq!(sorted_values(&table), vec!["10", "NA", "3", "NA", "7"]);
    }

    #[test]
    fn third_click_returns_to_declared_default() {
        let mut table = SortableTable::new(
            vec![
                Column {
                    default: Some(SortDirection::Descending),
                    ..column("Total", true)
                },
                column("Section", true),
            ],
            vec![
                row(0, "a", &["50", "1"]),
                row(1, "b", &["90", "3"]),
                row(2, "c", &["70", "2"]),
            ],
        );
        table.click(1);
        table.click(1);
        assert_eq!(table.labels(), vec!["a", "c", "b"]);
        table.click(1);
        assert_eq!(table.active(), Some((0, SortState::Descending)));
        assert_eq!(table.columns[1].state, SortState::None);
        assert_eq!(table.labels(), vec!["b", "c", "a"]);
    }

    #[test]
    fn switching_columns_resets_the_previous_one() {
        let mut table = SortableTable::new(
            vec![column("A", true), column("B", true)],
            vec![row(0, "x", &["1", "2"]), row(1, "y", &["2", "1"])],
        );
        table.click(0);
        table.click(0);
        table.click(1);
        let non_none = table
            .columns
            .iter()
            .filter(|c| c.state != SortState::None)
            .count();
        assert_eq!(non_none, 1);
        assert_eq!(table.columns[0].state, SortState::None);
        assert_eq!(table.columns[1].state, SortState::Descending);
    }

    #[test]
    fn named_sections_are_independent_of_layout() {
        let mut sections_a = HashMap::new();
        sections_a.insert("transport".to_string(), "12".to_string());
        let mut sections_b = HashMap::new();
        sections_b.insert("transport".to_string(), "40".to_string());
        let mut table = SortableTable::new(
            vec![Column {
                section: Some("transport".to_string()),
                ..column("Transport", true)
            }],
            vec![
                Row {
                    sections: sections_a,
                    ..row(0, "a", &[])
                },
                Row {
                    sections: sections_b,
                    ..row(1, "b", &[])
                },
            ],
        );
        table.click(0);
        assert_eq!(table.labels(), vec!["b", "a"]);
    }

    #[test]
    fn non_sortable_headers_ignore_clicks() {
        let mut table = score_table();
        assert!(!table.click(0));
        assert!(!table.click(9));
        assert!(table.active().is_none());
    }

    #[test]
    fn titles_describe_the_next_action() {
        let mut table = score_table();
        assert_eq!(table.columns[1].title(), "Sort highest first");
        table.click(1);
        assert_eq!(table.columns[1].title(), "Sort lowest first");
        table.click(1);
        assert_eq!(table.columns[1].title(), "Cancel sorting");
    }

    #[test]
    fn select_sort_sinks_zero_rows() {
        let mut table = SortableTable::new(
            vec![Column {
                field: Some("population".to_string()),
                ..column("Population", false)
            }],
            vec![
                row(0, "a", &["0"]),
                row(1, "b", &["120"]),
                row(2, "c", &["90"]),
                row(3, "d", &["0"]),
            ],
        );
        assert!(table.sort_by_field("population"));
        assert_eq!(table.labels(), vec!["c", "b", "a", "d"]);
        assert!(table.sort_by_field("-population"));
        assert_eq!(table.labels()[..2], ["b".to_string(), "c".to_string()]);
        assert!(!table.sort_by_field("region"));
    }

    #[test]
    fn select_sort_orders_names_ignoring_case() {
        let mut table = SortableTable::new(
            vec![Column {
                field: Some("name".to_string()),
                ..column("Name", false)
            }],
            vec![
                row(0, "derby", &["Derby"]),
                row(1, "dmu", &["de Montfort"]),
                row(2, "adur", &["adur"]),
                row(3, "arun", &["Arun"]),
            ],
        );
        assert!(table.sort_by_field("name"));
        assert_eq!(table.labels(), vec!["adur", "arun", "dmu", "derby"]);
    }
}
