use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::codec::{self, QueryParams, StateMap};

pub const COMPARISONS_PARAM: &str = "comparisons";
pub const JUMP_KEY: &str = "jump";
pub const COMPARISON_RESULTS_ANCHOR: &str = "results";

const RELATIVE_BASE: &str = "http://page.invalid/";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid page URL: {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// The navigation state of one page: path, query and hash. The URL is the
/// single source of truth, so `parse(href())` always rebuilds the same
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageState {
    pub path: String,
    pub query: QueryParams,
    pub hash: StateMap,
}

impl PageState {
    /// Parses an absolute URL or a root-relative href. The origin is not
    /// kept; navigation stays on the same origin.
    pub fn parse(href: &str) -> Result<Self, StateError> {
        let url = parse_href(href)?;
        let hash = match url.fragment() {
            Some(fragment) if !fragment.is_empty() => match codec::decode(fragment) {
                Ok(map) => map,
                Err(e) => {
                    debug!(error = %e, "ignoring undecodable hash state");
                    StateMap::new()
                }
            },
            _ => StateMap::new(),
        };
        Ok(Self {
            path: url.path().to_string(),
            query: QueryParams::parse(url.query().unwrap_or("")),
            hash,
        })
    }

    pub fn href(&self) -> String {
        let mut out = self.path_and_query();
        if !self.hash.is_empty() {
            out.push('#');
            out.push_str(&codec::encode(&self.hash));
        }
        out
    }

    pub fn path_and_query(&self) -> String {
        let mut out = self.path.clone();
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query.to_query_string());
        }
        out
    }

    pub fn comparisons(&self) -> Vec<String> {
        self.query.get_all(COMPARISONS_PARAM)
    }

    /// Adds `slug` to the comparison set. Returns false when it was
    /// already present, in which case nothing changes.
    pub fn add_comparison(&mut self, slug: &str) -> bool {
        let mut comparisons = self.comparisons();
        if comparisons.iter().any(|c| c == slug) {
            return false;
        }
        comparisons.push(slug.to_string());
        self.query.replace_all(COMPARISONS_PARAM, &comparisons);
        true
    }

    pub fn remove_comparison(&mut self, slug: &str) {
        let comparisons: Vec<String> = self
            .comparisons()
            .into_iter()
            .filter(|c| c != slug)
            .collect();
        self.query.replace_all(COMPARISONS_PARAM, &comparisons);
    }

    pub fn jump_slug(&self) -> Option<&str> {
        self.hash
            .get(JUMP_KEY)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn parse_href(href: &str) -> Result<Url, StateError> {
    let parsed = match Url::parse(href) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_BASE).and_then(|base| base.join(href))
        }
        Err(e) => Err(e),
    };
    parsed.map_err(|source| StateError::InvalidUrl {
        url: href.to_string(),
        source,
    })
}

/// Resolves `href` against the page at `current`, keeping only path,
/// query and fragment.
pub fn resolve_href(current: &PageState, href: &str) -> Result<PageState, StateError> {
    let base = parse_href(&current.path_and_query())?;
    let joined = base.join(href).map_err(|source| StateError::InvalidUrl {
        url: href.to_string(),
        source,
    })?;
    let mut out = joined.path().to_string();
    if let Some(q) = joined.query() {
        out.push('?');
        out.push_str(q);
    }
    if let Some(f) = joined.fragment() {
        out.push('#');
        out.push_str(f);
    }
    PageState::parse(&out)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    AddComparison(String),
    RemoveComparison(String),
    ReplaceQuery(QueryParams),
}

/// Where the page should go after `action`, without touching `current`.
pub fn compute_next_url(current: &PageState, action: &Action) -> String {
    let mut next = PageState {
        path: current.path.clone(),
        query: current.query.clone(),
        hash: StateMap::new(),
    };
    match action {
        Action::AddComparison(slug) => {
            next.add_comparison(slug);
            format!(
                "{}?{}#{}",
                next.path,
                next.query.to_query_string(),
                COMPARISON_RESULTS_ANCHOR
            )
        }
        Action::RemoveComparison(slug) => {
            next.remove_comparison(slug);
            format!("{}?{}", next.path, next.query.to_query_string())
        }
        Action::ReplaceQuery(query) => {
            next.query = query.clone();
            next.path_and_query()
        }
    }
}

/// `scoring_url` with the council's row named in the hash state.
pub fn jump_url(scoring_url: &str, slug: &str) -> String {
    let mut state = StateMap::new();
    state.insert(JUMP_KEY.to_string(), slug.to_string());
    format!("{scoring_url}#{}", codec::encode(&state))
}

/// Tracks the single highlighted `data-jump-slug` row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JumpHighlight {
    highlighted: Option<String>,
}

impl JumpHighlight {
    /// Applies the hash state. Only a slug present among the visible rows
    /// moves the highlight; anything else leaves it where it was.
    pub fn apply(&mut self, state: &PageState, visible_rows: &[String]) -> Option<&str> {
        if let Some(slug) = state.jump_slug() {
            if visible_rows.iter().any(|r| r == slug) {
                self.highlighted = Some(slug.to_string());
            }
        }
        self.highlighted.as_deref()
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_href_round_trip() {
        let href = "/scoring/district/?comparisons=adur&comparisons=york#jump=adur";
        let state = PageState::parse(href).unwrap();
        assert_eq!(state.path, "/scoring/district/");
        assert_eq!(state.comparisons(), vec!["adur", "york"]);
        assert_eq!(state.jump_slug(), Some("adur"));
        assert_eq!(PageState::parse(&state.href()).unwrap(), state);
    }

    #[test]
    fn absolute_urls_drop_the_origin() {
        let state = PageState::parse("https://councilclimatescorecards.uk/sections/?x=1").unwrap();
        assert_eq!(state.href(), "/sections/?x=1");
    }

    #[test]
    fn comparison_insert_is_idempotent() {
        let mut once = PageState::parse("/compare/?comparisons=adur").unwrap();
        let mut twice = once.clone();
        assert!(once.add_comparison("york"));
        assert!(twice.add_comparison("york"));
        assert!(!twice.add_comparison("york"));
        assert_eq!(once, twice);
        assert_eq!(once.comparisons(), vec!["adur", "york"]);
    }

    #[test]
    fn add_comparison_url_keeps_path_and_anchors_results() {
        let state = PageState::parse("/compare/?sort=score&comparisons=adur#jump=x").unwrap();
        let next = compute_next_url(&state, &Action::AddComparison("york".to_string()));
        assert_eq!(
            next,
            "/compare/?sort=score&comparisons=adur&comparisons=york#results"
        );
    }

    #[test]
    fn remove_comparison_drops_every_occurrence() {
        let state =
            PageState::parse("/compare/?comparisons=adur&comparisons=york&comparisons=adur")
                .unwrap();
        let next = compute_next_url(&state, &Action::RemoveComparison("adur".to_string()));
        assert_eq!(next, "/compare/?comparisons=york");
    }

    #[test]
    fn jump_url_encodes_slug_in_hash() {
        assert_eq!(
            jump_url("/scoring/single/", "st-albans"),
            "/scoring/single/#jump=st-albans"
        );
    }

    #[test]
    fn resolve_href_handles_relative_links() {
        let current = PageState::parse("/scoring/single/?region=x").unwrap();
        let next = resolve_href(&current, "?region=y&page=2").unwrap();
        assert_eq!(next.path_and_query(), "/scoring/single/?region=y&page=2");
        let other = resolve_href(&current, "../district/").unwrap();
        assert_eq!(other.path, "/scoring/district/");
    }

    #[test]
    fn highlight_moves_only_to_visible_rows() {
        let rows = vec!["adur".to_string(), "york".to_string()];
        let mut highlight = JumpHighlight::default();
        let state = PageState::parse("/scoring/#jump=york").unwrap();
        assert_eq!(highlight.apply(&state, &rows), Some("york"));

        let hidden = PageState::parse("/scoring/#jump=bath").unwrap();
        assert_eq!(highlight.apply(&hidden, &rows), Some("york"));
    }
}
