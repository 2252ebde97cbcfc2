use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::sort::{Column, Row, SortDirection, SortableTable};
use crate::toggle::FilterPanel;
use crate::utils;

pub const LOADING_CLASS: &str = "loading";
pub const FILTER_PANEL_SELECTOR: &str = ".council-list-filters";

pub const DEFAULT_REGIONS: [&str; 4] = [
    "#home-page-main-filter",
    ".scorecard-table",
    ".scorecard-table-mobile",
    "#council-type-filter",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("fetched document has no element matching '{selector}'")]
    MissingRegion { selector: String },
}

fn selector(css: &str) -> Result<Selector, DocumentError> {
    Selector::parse(css).map_err(|e| DocumentError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Outer HTML of the first element matching each selector; selectors with
/// no match are left out.
pub fn extract_regions(
    html: &str,
    selectors: &[String],
) -> Result<HashMap<String, String>, DocumentError> {
    let doc = Html::parse_document(html);
    let mut out = HashMap::new();
    for css in selectors {
        let sel = selector(css)?;
        if let Some(el) = doc.select(&sel).next() {
            out.insert(css.clone(), el.html());
        }
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub selector: String,
    pub html: String,
    pub loading: bool,
}

/// The swappable part of a page: its named regions plus the widgets bound
/// to them. Widgets are rebuilt whenever region HTML changes, since the
/// old bindings point at nodes that no longer exist.
#[derive(Clone, Debug, Default)]
pub struct Document {
    regions: Vec<Region>,
    tables: Vec<SortableTable>,
    filter_panel: Option<FilterPanel>,
}

impl Document {
    /// Reads the regions present in `html`. Missing ones are skipped and
    /// never swapped.
    pub fn parse(html: &str, selectors: &[String]) -> Result<Self, DocumentError> {
        let found = extract_regions(html, selectors)?;
        let regions = selectors
            .iter()
            .filter_map(|css| {
                found.get(css).map(|h| Region {
                    selector: css.clone(),
                    html: h.clone(),
                    loading: false,
                })
            })
            .collect();
        let mut doc = Self {
            regions,
            ..Default::default()
        };
        doc.rebind()?;
        Ok(doc)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, selector: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.selector == selector)
    }

    pub fn tables(&self) -> &[SortableTable] {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut [SortableTable] {
        &mut self.tables
    }

    pub fn filter_panel(&self) -> Option<&FilterPanel> {
        self.filter_panel.as_ref()
    }

    pub fn filter_panel_mut(&mut self) -> Option<&mut FilterPanel> {
        self.filter_panel.as_mut()
    }

    pub fn set_loading(&mut self, loading: bool) {
        for region in self.regions.iter_mut() {
            region.loading = loading;
        }
    }

    pub fn is_loading(&self) -> bool {
        self.regions.iter().any(|r| r.loading)
    }

    /// Replaces every region with its counterpart from `fetched`. Nothing
    /// changes unless all counterparts exist.
    pub fn replace_regions(&mut self, fetched: &str) -> Result<Vec<String>, DocumentError> {
        let selectors: Vec<String> = self.regions.iter().map(|r| r.selector.clone()).collect();
        let found = extract_regions(fetched, &selectors)?;
        if let Some(missing) = selectors.iter().find(|s| !found.contains_key(*s)) {
            return Err(DocumentError::MissingRegion {
                selector: missing.clone(),
            });
        }
        for region in self.regions.iter_mut() {
            if let Some(html) = found.get(&region.selector) {
                region.html = html.clone();
                region.loading = false;
            }
        }
        self.rebind()?;
        Ok(selectors)
    }

    fn rebind(&mut self) -> Result<(), DocumentError> {
        let mut tables = Vec::new();
        let mut filter_panel = None;
        let panel_sel = selector(FILTER_PANEL_SELECTOR)?;
        for region in &self.regions {
            tables.extend(parse_tables(&region.html)?);
            let fragment = Html::parse_fragment(&region.html);
            if fragment.select(&panel_sel).next().is_some() {
                filter_panel = Some(FilterPanel::default());
            }
        }
        debug!(tables = tables.len(), "rebound region widgets");
        self.tables = tables;
        self.filter_panel = filter_panel;
        Ok(())
    }
}

/// Sortable tables found in an HTML fragment. A table qualifies when at
/// least one header is clickable or names a select-sort field.
pub fn parse_tables(html: &str) -> Result<Vec<SortableTable>, DocumentError> {
    let fragment = Html::parse_fragment(html);
    let table_sel = selector("table")?;
    let header_sel = selector("thead th")?;
    let fallback_header_sel = selector("tr th")?;
    let trigger_sel = selector(".js-sort-table")?;
    let row_sel = selector("tbody tr")?;
    let section_sel = selector("[data-sort-section]")?;

    let mut out = Vec::new();
    for table in fragment.select(&table_sel) {
        let mut headers: Vec<ElementRef> = table.select(&header_sel).collect();
        if headers.is_empty() {
            headers = table.select(&fallback_header_sel).collect();
        }
        let columns: Vec<Column> = headers
            .iter()
            .map(|th| parse_column(th, &trigger_sel))
            .collect();
        if !columns.iter().any(|c| c.sortable || c.field.is_some()) {
            continue;
        }

        let rows = table
            .select(&row_sel)
            .enumerate()
            .map(|(position, tr)| parse_row(position, &tr, &section_sel))
            .collect();
        out.push(SortableTable::new(columns, rows));
    }
    Ok(out)
}

fn parse_column(th: &ElementRef, trigger_sel: &Selector) -> Column {
    let trigger = if th.value().classes().any(|c| c == "js-sort-table") {
        Some(*th)
    } else {
        th.select(trigger_sel).next()
    };
    let attr = |name: &str| -> Option<String> {
        trigger
            .and_then(|t| t.value().attr(name))
            .or_else(|| th.value().attr(name))
            .map(str::to_string)
    };
    Column {
        label: utils::collapse_whitespace(&th.text().collect::<String>()),
        sortable: trigger.is_some(),
        section: attr("data-sort-section"),
        field: th.value().attr("data-sortable").map(str::to_string),
        default: attr("data-sort-default").and_then(|d| SortDirection::parse(&d)),
        state: Default::default(),
    }
}

fn parse_row(position: usize, tr: &ElementRef, section_sel: &Selector) -> Row {
    let cells: Vec<ElementRef> = tr.children().filter_map(ElementRef::wrap).collect();
    let values = cells
        .iter()
        .map(|cell| {
            cell.value()
                .attr("data-sort-value")
                .or_else(|| cell.value().attr("data-sortvalue"))
                .map(str::to_string)
        })
        .collect();
    let sections = tr
        .select(section_sel)
        .filter_map(|el| {
            let name = el.value().attr("data-sort-section")?;
            let value = el.value().attr("data-sort-value")?;
            Some((name.to_string(), value.to_string()))
        })
        .collect();
    let label = tr
        .value()
        .attr("data-jump-slug")
        .map(str::to_string)
        .or_else(|| {
            cells
                .first()
                .map(|c| utils::collapse_whitespace(&c.text().collect::<String>()))
        })
        .unwrap_or_default();
    Row {
        position,
        label,
        html: tr.html(),
        cells: values,
        sections,
    }
}
