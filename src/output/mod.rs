use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;

use crate::analytics::{AnalyticsEvent, FollowUp, TrackedClick};
use crate::autocomplete::{Effect, Suggestions};
use crate::geolocate::GeolocateOutcome;
use crate::interstitial::SubmitOutcome;
use crate::registry::Council;
use crate::reload::ReloadOutcome;
use crate::sort::{SortState, SortableTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ColumnView {
    pub label: String,
    pub state: SortState,
    pub title: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct TableView {
    pub columns: Vec<ColumnView>,
    pub rows: Vec<String>,
}

impl From<&SortableTable> for TableView {
    fn from(table: &SortableTable) -> Self {
        Self {
            columns: table
                .columns
                .iter()
                .filter(|c| c.sortable)
                .map(|c| ColumnView {
                    label: c.label.clone(),
                    state: c.state,
                    title: c.title(),
                })
                .collect(),
            rows: table.labels(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GateView {
    pub action: String,
    pub should_show: bool,
    pub modal_visible: bool,
    pub entries: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReloadView {
    pub outcome: ReloadOutcome,
    pub history: Vec<String>,
    pub full_navigations: Vec<String>,
    pub tables: Vec<TableView>,
}

/// Result of one CLI command, rendered as text or JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Report {
    Council(Option<Council>),
    Suggestions(Suggestions),
    Effect(Option<Effect>),
    Url(String),
    Encoded(String),
    Decoded(BTreeMap<String, String>),
    Table(TableView),
    Reload(ReloadView),
    Gate(GateView),
    Locate(GeolocateOutcome),
    Track {
        event: AnalyticsEvent,
        click: TrackedClick,
    },
    ConfigWritten {
        path: String,
        created: bool,
    },
    Copied(String),
    Form {
        outcome: SubmitOutcome,
        gate: GateView,
    },
}

fn kv_line(label: &str, value: &str) -> String {
    format!(":: {:<10}: {}", label, value)
}

fn none_line() -> String {
    format!("{}", "(none)".dimmed())
}

pub fn render_text(report: &Report) -> String {
    let mut lines: Vec<String> = Vec::new();
    match report {
        Report::Council(Some(c)) => {
            lines.push(kv_line("Name", &c.name.bold().to_string()));
            lines.push(kv_line("Slug", &c.slug));
            lines.push(kv_line("Type", &c.council_type));
            lines.push(kv_line("Page", &c.council_url));
            lines.push(kv_line("Scoring", &c.scoring_url));
        }
        Report::Council(None) | Report::Effect(None) => lines.push(none_line()),
        Report::Suggestions(s) => {
            if s.items.is_empty() {
                lines.push(none_line());
            }
            for (i, item) in s.items.iter().enumerate() {
                if s.highlighted == Some(i) {
                    lines.push(format!("{} {}", ">".green(), item.bold()));
                } else {
                    lines.push(format!("  {item}"));
                }
            }
        }
        Report::Effect(Some(Effect::Navigate(url))) | Report::Url(url) => {
            lines.push(kv_line("Navigate", &url.cyan().to_string()))
        }
        Report::Effect(Some(Effect::SetActiveCouncilType(t))) => {
            lines.push(kv_line("Type", &t.cyan().to_string()))
        }
        Report::Encoded(raw) => lines.push(raw.clone()),
        Report::Decoded(map) => {
            if map.is_empty() {
                lines.push(none_line());
            }
            for (k, v) in map {
                lines.push(format!("{k}={v}"));
            }
        }
        Report::Table(view) => render_table(view, &mut lines),
        Report::Reload(view) => {
            let summary = match &view.outcome {
                ReloadOutcome::Applied { url, regions } => format!(
                    "{} {} ({} regions)",
                    "applied".green(),
                    url,
                    regions.len()
                ),
                ReloadOutcome::FellBack { url, reason } => {
                    format!("{} {} ({})", "full navigation".yellow(), url, reason)
                }
                ReloadOutcome::Discarded { url, generation } => {
                    format!("{} {} (generation {})", "discarded".dimmed(), url, generation)
                }
                ReloadOutcome::Ignored => "ignored".dimmed().to_string(),
            };
            lines.push(kv_line("Reload", &summary));
            lines.push(kv_line("History", &view.history.join(" -> ")));
            for table in &view.tables {
                render_table(table, &mut lines);
            }
        }
        Report::Gate(view) => {
            lines.push(kv_line("Action", &view.action));
            lines.push(kv_line("Due", &yes_no(view.should_show)));
            lines.push(kv_line("Modal", &yes_no(view.modal_visible)));
            for (k, v) in &view.entries {
                lines.push(format!("   {k} = {v}"));
            }
        }
        Report::Locate(outcome) => match outcome {
            GeolocateOutcome::Hidden => lines.push(kv_line("Locate", "hidden")),
            GeolocateOutcome::Navigate(url) => {
                lines.push(kv_line("Navigate", &url.cyan().to_string()))
            }
            GeolocateOutcome::Alert(text) => lines.push(kv_line("Alert", &text.yellow().to_string())),
        },
        Report::Track { event, click } => {
            lines.push(kv_line("Event", &event.name.bold().to_string()));
            for (k, v) in &event.params {
                lines.push(format!("   {k} = {v}"));
            }
            lines.push(kv_line("Outcome", &format!("{:?}", click.outcome).to_lowercase()));
            let follow = match &click.follow_up {
                FollowUp::BrowserDefault => "left to browser".to_string(),
                FollowUp::Navigate(url) => url.cyan().to_string(),
                FollowUp::Nothing => "none".to_string(),
            };
            lines.push(kv_line("Then", &follow));
        }
        Report::ConfigWritten { path, created } => {
            let status = if *created {
                "written".green().to_string()
            } else {
                "already exists".yellow().to_string()
            };
            lines.push(kv_line("Config", &format!("{path} ({status})")));
        }
        Report::Copied(text) => lines.push(kv_line("Copied", text)),
        Report::Form { outcome, gate } => {
            lines.push(kv_line("Sent", &yes_no(outcome.delivered)));
            lines.push(kv_line("Recorded", &yes_no(outcome.recorded)));
            lines.push(kv_line("Closed", &yes_no(outcome.modal_closed)));
            lines.push(kv_line("Due", &yes_no(gate.should_show)));
            for (k, v) in &gate.entries {
                lines.push(format!("   {k} = {v}"));
            }
        }
    }
    lines.join("\n")
}

fn yes_no(v: bool) -> String {
    if v {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

fn render_table(view: &TableView, lines: &mut Vec<String>) {
    for col in &view.columns {
        let state = match col.state {
            SortState::None => "-".dimmed().to_string(),
            SortState::Ascending => "asc".green().to_string(),
            SortState::Descending => "desc".green().to_string(),
        };
        lines.push(format!(":: {:<20} [{}] {}", col.label, state, col.title.dimmed()));
    }
    for (i, row) in view.rows.iter().enumerate() {
        lines.push(format!("{:>4}. {}", i + 1, row));
    }
}

pub fn render(report: &Report, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("failed to serialize output: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!(OutputFormat::parse(" JSON "), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("txt"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn json_is_tagged_by_kind() {
        let out = render(&Report::Url("/compare/?comparisons=a".to_string()), OutputFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["kind"], "url");
        assert_eq!(v["data"], "/compare/?comparisons=a");
    }

    #[test]
    fn text_marks_the_highlighted_suggestion() {
        colored::control::set_override(false);
        let report = Report::Suggestions(Suggestions {
            items: vec!["Adur".to_string(), "Arun".to_string()],
            highlighted: Some(0),
        });
        let text = render_text(&report);
        assert!(text.starts_with("> Adur"));
        assert!(text.contains("  Arun"));
    }
}
