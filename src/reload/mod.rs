use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::codec::QueryParams;
use crate::document::{Document, DocumentError};
use crate::state::{self, Action, PageState, StateError};

pub const DEFAULT_LISTING_PATHS: [&str; 6] = [
    "/",
    "/scoring/single/",
    "/scoring/district/",
    "/scoring/county/",
    "/scoring/northern-ireland/",
    "/scoring/combined/",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("invalid fetch URL: {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("fetch is not available")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base URL: {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the HTML document at a same-origin path.
    async fn fetch(&self, path: &str) -> Result<String, FetchError>;
}

/// Stand-in for environments without fetch; every reload falls back to a
/// full navigation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFetch;

#[async_trait]
impl Fetcher for NoFetch {
    async fn fetch(&self, _path: &str) -> Result<String, FetchError> {
        Err(FetchError::Unsupported)
    }
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, ReloadError> {
        let base = Url::parse(base_url).map_err(|source| ReloadError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("text/html"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("scorecard-page/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|source| ReloadError::HttpClientBuild { source })?;
        Ok(Self { client, base })
    }

    pub fn absolute(&self, path: &str) -> Result<Url, FetchError> {
        self.base.join(path).map_err(|source| FetchError::InvalidUrl {
            url: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let url = self.absolute(path)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

/// Session history and location, as seen by the controller.
pub trait Navigator {
    /// Adds an entry without loading it.
    fn push_state(&mut self, url: &str);
    /// Full page navigation.
    fn assign(&mut self, url: &str);
}

/// In-memory history used by the headless driver and tests.
#[derive(Clone, Debug, Default)]
pub struct SessionHistory {
    entries: Vec<String>,
    index: usize,
    full_navigations: Vec<String>,
}

impl SessionHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![initial.to_string()],
            index: 0,
            full_navigations: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn full_navigations(&self) -> &[String] {
        &self.full_navigations
    }

    /// Steps back one entry and returns the URL a popstate would carry.
    pub fn back(&mut self) -> Option<String> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.current().map(str::to_string)
    }

    pub fn forward(&mut self) -> Option<String> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.current().map(str::to_string)
    }
}

impl Navigator for SessionHistory {
    fn push_state(&mut self, url: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url.to_string());
        self.index = self.entries.len() - 1;
    }

    fn assign(&mut self, url: &str) {
        self.full_navigations.push(url.to_string());
        self.push_state(url);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    FilterLink { href: String },
    FormSubmit { fields: Vec<(String, String)> },
    FieldChange { fields: Vec<(String, String)> },
    PopState { url: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadTicket {
    pub generation: u64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Applied { url: String, regions: Vec<String> },
    FellBack { url: String, reason: String },
    /// A newer reload started before this one finished.
    Discarded { url: String, generation: u64 },
    Ignored,
}

/// Turns filter interactions into history entries plus in-place region
/// swaps. Only the most recently started reload may touch the document.
#[derive(Debug)]
pub struct ReloadController<N: Navigator> {
    page: PageState,
    document: Document,
    navigator: N,
    listing_paths: Vec<String>,
    generation: u64,
}

impl<N: Navigator> ReloadController<N> {
    pub fn new(page: PageState, document: Document, navigator: N, listing_paths: Vec<String>) -> Self {
        Self {
            page,
            document,
            navigator,
            listing_paths,
            generation: 0,
        }
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    pub fn is_listing_path(&self, path: &str) -> bool {
        self.listing_paths.iter().any(|p| p == path)
    }

    /// The URL a trigger leads to, or `None` when it should be left to the
    /// browser.
    pub fn target_url(&self, trigger: &Trigger) -> Option<String> {
        match trigger {
            Trigger::FilterLink { href } => match state::resolve_href(&self.page, href) {
                Ok(next) => Some(next.path_and_query()),
                Err(e) => {
                    debug!(error = %e, "filter link has no usable href");
                    None
                }
            },
            Trigger::FormSubmit { fields } | Trigger::FieldChange { fields } => {
                let query = QueryParams::from_pairs(fields.iter().cloned());
                Some(state::compute_next_url(&self.page, &Action::ReplaceQuery(query)))
            }
            Trigger::PopState { url } => {
                let landed = PageState::parse(url).ok()?;
                if self.is_listing_path(&landed.path) {
                    Some(landed.path_and_query())
                } else {
                    None
                }
            }
        }
    }

    /// Starts a reload: records the URL in history (except for popstate,
    /// where the browser already moved) and marks regions as loading.
    pub fn begin(&mut self, trigger: &Trigger) -> Option<ReloadTicket> {
        let url = self.target_url(trigger)?;
        if !matches!(trigger, Trigger::PopState { .. }) {
            self.navigator.push_state(&url);
        }
        match PageState::parse(&url) {
            Ok(page) => self.page = page,
            Err(e) => warn!(error = %e, url = %url, "could not parse reload URL"),
        }
        self.generation += 1;
        self.document.set_loading(true);
        info!(url = %url, generation = self.generation, "partial reload started");
        Some(ReloadTicket {
            generation: self.generation,
            url,
        })
    }

    /// Applies a finished fetch. Stale tickets are dropped; any fetch or
    /// parse failure becomes a full navigation to the ticket URL.
    pub fn complete(
        &mut self,
        ticket: ReloadTicket,
        fetched: Result<String, FetchError>,
    ) -> ReloadOutcome {
        if ticket.generation != self.generation {
            info!(
                url = %ticket.url,
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale partial reload"
            );
            return ReloadOutcome::Discarded {
                url: ticket.url,
                generation: ticket.generation,
            };
        }
        let swapped = match fetched {
            Ok(html) => self.document.replace_regions(&html).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match swapped {
            Ok(regions) => {
                info!(url = %ticket.url, regions = regions.len(), "partial reload applied");
                ReloadOutcome::Applied {
                    url: ticket.url,
                    regions,
                }
            }
            Err(reason) => {
                warn!(url = %ticket.url, reason = %reason, "partial reload failed, navigating");
                self.document.set_loading(false);
                self.navigator.assign(&ticket.url);
                ReloadOutcome::FellBack {
                    url: ticket.url,
                    reason,
                }
            }
        }
    }

    pub async fn handle<F>(&mut self, trigger: &Trigger, fetcher: &F) -> ReloadOutcome
    where
        F: Fetcher + ?Sized,
    {
        let Some(ticket) = self.begin(trigger) else {
            return ReloadOutcome::Ignored;
        };
        let fetched = fetcher.fetch(&ticket.url).await;
        self.complete(ticket, fetched)
    }
}

pub fn default_listing_paths() -> Vec<String> {
    DEFAULT_LISTING_PATHS.iter().map(|p| p.to_string()).collect()
}
