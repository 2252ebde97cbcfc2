use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::analytics::{self, AnalyticsError, AnalyticsEvent, EventSink, FollowUp, Modifiers, TrackOutcome};
use crate::autocomplete::{Autocomplete, AutocompleteOptions, Effect, Variant};
use crate::codec::{self, StateMap};
use crate::document::{Document, DEFAULT_REGIONS};
use crate::interstitial::{InterstitialGate, MemoryStore};
use crate::registry::Registry;
use crate::reload::{
    default_listing_paths, FetchError, Fetcher, NoFetch, ReloadController, ReloadOutcome,
    SessionHistory, Trigger,
};
use crate::sort::SortState;
use crate::state::{JumpHighlight, PageState};

const COUNCILS: &str = r#"[
  {"name": "Adur District Council", "slug": "adur", "council_type": "district",
   "council_url": "/councils/adur/", "scoring_url": "/scoring/district/", "region": "South East"},
  {"name": "York City Council", "slug": "york", "council_type": "single",
   "council_url": "/councils/york/", "scoring_url": "/scoring/single/"},
  {"name": "Arun District Council", "slug": "arun", "council_type": "district",
   "council_url": "/councils/arun/", "scoring_url": "/scoring/district/"}
]"#;

fn listing(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(slug, score)| {
            format!(
                r#"<tr data-jump-slug="{slug}"><td>{slug}</td><td data-sort-value="{score}">{score}</td>
                   <td data-sort-value="1">1</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <div id="home-page-main-filter"><form class="council-list-filters"></form></div>
        <div class="scorecard-table"><table>
          <thead><tr><th>Council</th>
            <th><button class="js-sort-table">Total</button></th>
            <th><button class="js-sort-table" data-sort-default="descending">Buildings</button></th>
          </tr></thead>
          <tbody>{body}</tbody>
        </table></div>
        <div id="council-type-filter"></div>
        </body></html>"#
    )
}

fn regions() -> Vec<String> {
    DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect()
}

struct PageServer {
    pages: HashMap<String, String>,
}

#[async_trait]
impl Fetcher for PageServer {
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        self.pages.get(path).cloned().ok_or(FetchError::Status {
            url: path.to_string(),
            status: 404,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[test]
fn decode_inverts_encode_for_awkward_values() {
    let maps: Vec<StateMap> = vec![
        StateMap::new(),
        [("jump", "st-albans")].iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        [("q", "a b+c"), ("x=y", "50%"), ("empty", ""), ("ü", "ñ/é")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ];
    for m in maps {
        assert_eq!(codec::decode(&codec::encode(&m)).unwrap(), m);
    }
}

#[test]
fn compare_autocomplete_builds_an_idempotent_comparison_url() {
    let registry = Registry::from_json(COUNCILS).unwrap();
    let page = PageState::parse("/compare/?comparisons=adur").unwrap();
    let ac = Autocomplete::attach(&registry, AutocompleteOptions::new(Variant::Compare));

    let Some(Effect::Navigate(first)) = ac.select("York City Council", &registry, &page) else {
        panic!("expected navigation");
    };
    let landed = PageState::parse(&first).unwrap();
    assert_eq!(landed.comparisons(), vec!["adur", "york"]);

    let Some(Effect::Navigate(again)) = ac.select("York City Council", &registry, &landed) else {
        panic!("expected navigation");
    };
    assert_eq!(PageState::parse(&again).unwrap().comparisons(), landed.comparisons());
}

#[test]
fn unknown_selection_changes_nothing() {
    let registry = Registry::from_json(COUNCILS).unwrap();
    let page = PageState::parse("/compare/?comparisons=adur").unwrap();
    let snapshot = page.clone();
    for variant in [Variant::Search, Variant::Jump, Variant::Compare, Variant::Methodology] {
        let ac = Autocomplete::attach(&registry, AutocompleteOptions::new(variant));
        assert_eq!(ac.select("Atlantis Council", &registry, &page), None);
    }
    assert_eq!(page, snapshot);
}

#[test]
fn jump_selection_highlights_the_row_on_arrival() {
    let registry = Registry::from_json(COUNCILS).unwrap();
    let ac = Autocomplete::attach(&registry, AutocompleteOptions::new(Variant::Jump));
    let Some(Effect::Navigate(url)) = ac.select("Arun District Council", &registry, &PageState::default())
    else {
        panic!("expected navigation");
    };
    let arrived = PageState::parse(&url).unwrap();
    let doc = Document::parse(&listing(&[("adur", "40"), ("arun", "52")]), &regions()).unwrap();

    let mut highlight = JumpHighlight::default();
    assert_eq!(highlight.apply(&arrived, &doc.tables()[0].labels()), Some("arun"));
}

#[test]
fn tri_state_cycle_on_a_parsed_table() {
    let mut doc = Document::parse(
        &listing(&[("a", "10"), ("b", "NA"), ("c", "3"), ("d", "NA"), ("e", "7")]),
        &regions(),
    )
    .unwrap();
    let table = &mut doc.tables_mut()[0];

    assert!(table.click(1));
    assert_eq!(table.columns[1].state, SortState::Descending);
    assert_eq!(table.labels(), vec!["a", "e", "c", "b", "d"]);

    assert!(table.click(1));
    assert_eq!(table.columns[1].state, SortState::Ascending);
    assert_eq!(table.labels(), vec!["c", "e", "a", "b", "d"]);

    assert!(table.click(1));
    assert_eq!(table.columns[1].state, SortState::None);
    assert_eq!(table.columns[2].state, SortState::Descending);

    let active = table
        .columns
        .iter()
        .filter(|c| c.state != SortState::None)
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn reload_rebinds_tables_and_collapses_filters() {
    let mut doc = Document::parse(&listing(&[("adur", "40")]), &regions()).unwrap();
    doc.tables_mut()[0].click(1);
    if let Some(panel) = doc.filter_panel_mut() {
        panel.toggle();
    }

    let mut ctl = ReloadController::new(
        PageState::parse("/scoring/district/").unwrap(),
        doc,
        SessionHistory::new("/scoring/district/"),
        default_listing_paths(),
    );
    let server = PageServer {
        pages: HashMap::from([(
            "/scoring/district/?population=large".to_string(),
            listing(&[("arun", "52"), ("adur", "40")]),
        )]),
    };
    let outcome = ctl
        .handle(
            &Trigger::FieldChange {
                fields: vec![("population".to_string(), "large".to_string())],
            },
            &server,
        )
        .await;

    assert!(matches!(outcome, ReloadOutcome::Applied { .. }));
    let table = &ctl.document().tables()[0];
    assert_eq!(table.labels(), vec!["arun", "adur"]);
    assert!(table.columns.iter().all(|c| c.state == SortState::None));
    assert!(!ctl.document().filter_panel().unwrap().is_open());
    assert_eq!(ctl.page().query.get("population"), Some("large"));
}

#[tokio::test]
async fn fetch_rejection_becomes_a_full_navigation() {
    let doc = Document::parse(&listing(&[("adur", "40")]), &regions()).unwrap();
    let mut ctl = ReloadController::new(
        PageState::parse("/").unwrap(),
        doc,
        SessionHistory::new("/"),
        default_listing_paths(),
    );
    let outcome = ctl
        .handle(
            &Trigger::FilterLink {
                href: "/?region=wales".to_string(),
            },
            &NoFetch,
        )
        .await;
    assert!(matches!(outcome, ReloadOutcome::FellBack { .. }));
    assert_eq!(ctl.navigator().full_navigations(), &["/?region=wales".to_string()]);
}

#[tokio::test]
async fn watched_form_arms_survey_and_answer_is_tracked() {
    let now = chrono::Utc::now();
    let mut gate = InterstitialGate::new(Some(MemoryStore::new()));
    assert!(gate.handle_trigger(now));
    assert!(gate.on_page_load());
    gate.modal_shown();

    let sink = RecordingSink::default();
    let answer = analytics::survey_response("audience", "  Council officer\n");
    let click = analytics::tracked_click(&sink, &answer, None, Modifiers::default(), Duration::from_millis(200)).await;
    assert_eq!(click.outcome, TrackOutcome::Delivered);
    assert_eq!(click.follow_up, FollowUp::Nothing);

    gate.record_submission(now);
    assert!(!gate.should_show(now + chrono::Duration::days(365)));

    let events = sink.events.lock().unwrap();
    assert_eq!(events[0].params["survey_answer"], "Council officer");
    assert_eq!(events[0].params["survey_question"], "audience");
}
