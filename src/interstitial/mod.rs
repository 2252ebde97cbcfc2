//! Cooldown gate for the interstitial survey modal, plus the data-download
//! feedback modal that shares its storage conventions.
//!
//! State lives in three durable string entries. A submission disables the
//! survey for good; a skip silences it for seven days.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::utils;

pub const SUBMITTED_KEY: &str = "submitted-interstitial-timestamp";
pub const SKIPPED_KEY: &str = "skipped-interstitial-timestamp";
pub const SHOW_NEXT_KEY: &str = "show-interstitial-on-next-pageload";
pub const FLAG_VALUE: &str = "1";

pub fn cooling_off_period() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String key-value storage that survives page loads.
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten after every change.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens `path`, treating a missing file as an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        let body = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, body).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

fn timestamp_value(now: DateTime<Utc>) -> String {
    utils::format_timestamp(now)
}

/// Survey gate over an optional store. Without a store the survey never
/// shows and every handler is a no-op. Storage failures are logged and
/// otherwise ignored, since nothing here is user-visible.
#[derive(Debug)]
pub struct InterstitialGate<S: DurableStore> {
    store: Option<S>,
    modal_visible: bool,
}

impl<S: DurableStore> InterstitialGate<S> {
    pub fn new(store: Option<S>) -> Self {
        Self {
            store,
            modal_visible: false,
        }
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn into_store(self) -> Option<S> {
        self.store
    }

    pub fn modal_visible(&self) -> bool {
        self.modal_visible
    }

    fn read(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "durable store read failed");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: Option<&str>) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = match value {
            Some(v) => store.set(key, v),
            None => store.remove(key),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "durable store write failed");
        }
    }

    /// True unless a submission was ever recorded or a skip happened less
    /// than seven days before `now`. An unreadable skip timestamp does not
    /// block the survey.
    pub fn should_show(&self, now: DateTime<Utc>) -> bool {
        if self.store.is_none() {
            return false;
        }
        if self.read(SUBMITTED_KEY).is_some() {
            return false;
        }
        if let Some(raw) = self.read(SKIPPED_KEY) {
            let skipped = raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(utils::from_unix_timestamp);
            match skipped {
                Some(at) if now.signed_duration_since(at) < cooling_off_period() => return false,
                Some(_) => {}
                None => debug!(value = %raw, "ignoring unreadable skip timestamp"),
            }
        }
        true
    }

    /// A watched link was clicked or form submitted. Arms the flag for the
    /// next page load when the survey is due; returns whether it did.
    pub fn handle_trigger(&mut self, now: DateTime<Utc>) -> bool {
        if !self.should_show(now) {
            return false;
        }
        self.write(SKIPPED_KEY, None);
        self.write(SHOW_NEXT_KEY, Some(FLAG_VALUE));
        debug!("interstitial armed for next page load");
        true
    }

    /// Page load: opens the modal when the flag is present.
    pub fn on_page_load(&mut self) -> bool {
        self.modal_visible = self.read(SHOW_NEXT_KEY).is_some();
        self.modal_visible
    }

    /// The modal finished opening; the flag is consumed.
    pub fn modal_shown(&mut self) {
        self.write(SHOW_NEXT_KEY, None);
    }

    /// The modal is closing. Without a recorded submission this counts as
    /// a skip.
    pub fn modal_hidden(&mut self, now: DateTime<Utc>) {
        self.modal_visible = false;
        if self.read(SUBMITTED_KEY).is_none() {
            let stamp = timestamp_value(now);
            self.write(SKIPPED_KEY, Some(&stamp));
        }
    }

    /// The survey form inside the modal was submitted. Records the
    /// submission and closes the modal.
    pub fn record_submission(&mut self, now: DateTime<Utc>) {
        let stamp = timestamp_value(now);
        self.write(SUBMITTED_KEY, Some(&stamp));
        if self.modal_visible {
            self.modal_hidden(now);
        }
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("static regex"))
}

/// Download links open a feedback modal first; closing it continues to
/// the download unless the user dismissed it with Escape or a click on
/// the backdrop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadFeedback {
    pending: Option<String>,
    visible: bool,
}

impl DownloadFeedback {
    pub fn open(&mut self, href: &str) {
        self.pending = Some(href.to_string());
        self.visible = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn escape(&mut self) {
        self.pending = None;
    }

    pub fn click(&mut self, inside_dialog: bool) {
        if !inside_dialog {
            self.pending = None;
        }
    }

    /// Closes the modal and returns where to navigate, if anywhere.
    pub fn hide(&mut self) -> Option<String> {
        self.visible = false;
        self.pending.take().filter(|h| !h.is_empty())
    }

    /// The submit button is enabled only for a plausible email address.
    pub fn submit_enabled(email: &str) -> bool {
        let email = email.trim();
        !email.is_empty() && email_re().is_match(email)
    }
}

/// How a background-submitted form treats its enclosing modal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// Closes the modal, then posts.
    Ajax,
    /// Inside a modal it counts as the survey submission before closing.
    Feedback,
}

impl FormKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ajax" => Some(Self::Ajax),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// A form submitted in the background instead of navigating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AjaxForm {
    pub kind: FormKind,
    pub method: String,
    pub action: String,
    pub fields: Vec<(String, String)>,
    pub in_modal: bool,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid form action: {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported form method '{0}'")]
    Method(String),

    #[error("form submission failed: {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
}

#[async_trait]
pub trait FormSubmitter: Send + Sync {
    async fn submit(&self, form: &AjaxForm) -> Result<(), SubmitError>;
}

/// Sends forms over HTTP, resolving the action against the site origin.
/// `GET` forms carry their fields in the query string, anything else as an
/// urlencoded body.
#[derive(Clone, Debug)]
pub struct HttpFormSubmitter {
    client: reqwest::Client,
    base: Url,
}

impl HttpFormSubmitter {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, SubmitError> {
        let base = Url::parse(base_url).map_err(|source| SubmitError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("scorecard-page/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|source| SubmitError::ClientBuild { source })?;
        Ok(Self { client, base })
    }
}

#[async_trait]
impl FormSubmitter for HttpFormSubmitter {
    async fn submit(&self, form: &AjaxForm) -> Result<(), SubmitError> {
        let url = self
            .base
            .join(&form.action)
            .map_err(|source| SubmitError::InvalidUrl {
                url: form.action.clone(),
                source,
            })?;
        let method = if form.method.trim().is_empty() {
            reqwest::Method::GET
        } else {
            reqwest::Method::from_bytes(form.method.trim().to_uppercase().as_bytes())
                .map_err(|_| SubmitError::Method(form.method.clone()))?
        };
        let request = self.client.request(method.clone(), url.clone());
        let request = if method == reqwest::Method::GET {
            request.query(&form.fields)
        } else {
            request.form(&form.fields)
        };
        let resp = request.send().await.map_err(|source| SubmitError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SubmitError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub recorded: bool,
    pub modal_closed: bool,
    pub delivered: bool,
}

/// Handles a background form submission. The modal is dealt with first and
/// the request result only affects `delivered`; failures are logged.
pub async fn submit_form<S, F>(
    gate: &mut InterstitialGate<S>,
    form: &AjaxForm,
    submitter: &F,
    now: DateTime<Utc>,
) -> SubmitOutcome
where
    S: DurableStore,
    F: FormSubmitter + ?Sized,
{
    let mut outcome = SubmitOutcome::default();
    if form.in_modal {
        match form.kind {
            FormKind::Feedback => {
                gate.record_submission(now);
                outcome.recorded = gate.store().is_some();
            }
            FormKind::Ajax if gate.modal_visible() => gate.modal_hidden(now),
            FormKind::Ajax => {}
        }
        outcome.modal_closed = true;
    }
    match submitter.submit(form).await {
        Ok(()) => {
            debug!(action = %form.action, "form submitted");
            outcome.delivered = true;
        }
        Err(e) => warn!(action = %form.action, error = %e, "form submission failed"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        utils::from_unix_timestamp(1_700_000_000.0).unwrap()
    }

    fn gate_with(key: &str, value: &str) -> InterstitialGate<MemoryStore> {
        let mut store = MemoryStore::new();
        store.set(key, value).unwrap();
        InterstitialGate::new(Some(store))
    }

    #[test]
    fn skip_older_than_a_week_shows_again() {
        let skipped = timestamp_value(now() - Duration::days(8));
        assert!(gate_with(SKIPPED_KEY, &skipped).should_show(now()));
    }

    #[test]
    fn recent_skip_is_respected() {
        let skipped = timestamp_value(now() - Duration::days(1));
        assert!(!gate_with(SKIPPED_KEY, &skipped).should_show(now()));
    }

    #[test]
    fn any_submission_disables_the_survey() {
        assert!(!gate_with(SUBMITTED_KEY, "0").should_show(now()));
        assert!(!gate_with(SUBMITTED_KEY, "garbage").should_show(now()));
    }

    #[test]
    fn no_store_means_no_survey() {
        let mut gate: InterstitialGate<MemoryStore> = InterstitialGate::new(None);
        assert!(!gate.should_show(now()));
        assert!(!gate.handle_trigger(now()));
        assert!(!gate.on_page_load());
    }

    #[test]
    fn full_cycle_trigger_show_skip() {
        let stale = timestamp_value(now() - Duration::days(30));
        let mut gate = gate_with(SKIPPED_KEY, &stale);

        assert!(gate.handle_trigger(now()));
        let entries = gate.store().unwrap().entries().clone();
        assert_eq!(entries.get(SHOW_NEXT_KEY).map(String::as_str), Some(FLAG_VALUE));
        assert!(!entries.contains_key(SKIPPED_KEY));

        assert!(gate.on_page_load());
        gate.modal_shown();
        gate.modal_hidden(now());
        assert!(!gate.modal_visible());

        let entries = gate.store().unwrap().entries();
        assert!(!entries.contains_key(SHOW_NEXT_KEY));
        assert!(entries.contains_key(SKIPPED_KEY));
        assert!(!gate.should_show(now() + Duration::days(1)));
        assert!(gate.should_show(now() + Duration::days(8)));
    }

    #[test]
    fn submission_is_not_recorded_as_skip() {
        let mut gate = InterstitialGate::new(Some(MemoryStore::new()));
        gate.handle_trigger(now());
        gate.on_page_load();
        gate.modal_shown();
        gate.record_submission(now());
        let entries = gate.store().unwrap().entries();
        assert!(entries.contains_key(SUBMITTED_KEY));
        assert!(!entries.contains_key(SKIPPED_KEY));
        assert!(!gate.modal_visible());
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set(SKIPPED_KEY, "123").unwrap();
        store.remove("absent").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(SKIPPED_KEY).unwrap().as_deref(), Some("123"));
    }

    #[test]
    fn corrupt_file_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn download_feedback_continues_unless_dismissed() {
        let mut modal = DownloadFeedback::default();
        modal.open("/files/data.csv");
        modal.click(true);
        assert_eq!(modal.hide().as_deref(), Some("/files/data.csv"));

        modal.open("/files/data.csv");
        modal.escape();
        assert_eq!(modal.hide(), None);

        modal.open("/files/data.csv");
        modal.click(false);
        assert_eq!(modal.hide(), None);
        assert!(!modal.is_visible());
    }

    #[test]
    fn feedback_submit_needs_an_email() {
        assert!(DownloadFeedback::submit_enabled("someone@example.org"));
        assert!(!DownloadFeedback::submit_enabled(""));
        assert!(!DownloadFeedback::submit_enabled("not an email"));
    }

    #[derive(Default)]
    struct RecordingSubmitter {
        sent: std::sync::Mutex<Vec<AjaxForm>>,
        fail: bool,
    }

    #[async_trait]
    impl FormSubmitter for RecordingSubmitter {
        async fn submit(&self, form: &AjaxForm) -> Result<(), SubmitError> {
            self.sent.lock().unwrap().push(form.clone());
            if self.fail {
                Err(SubmitError::Status {
                    url: form.action.clone(),
                    status: 500,
                })
            } else {
                Ok(())
            }
        }
    }

    fn survey_form(kind: FormKind, in_modal: bool) -> AjaxForm {
        AjaxForm {
            kind,
            method: "post".to_string(),
            action: "/feedback/".to_string(),
            fields: vec![("audience".to_string(), "Council officer".to_string())],
            in_modal,
        }
    }

    fn open_gate() -> InterstitialGate<MemoryStore> {
        let mut gate = InterstitialGate::new(Some(MemoryStore::new()));
        gate.handle_trigger(now());
        gate.on_page_load();
        gate.modal_shown();
        gate
    }

    #[tokio::test]
    async fn feedback_form_in_modal_records_submission_and_posts() {
        let mut gate = open_gate();
        let submitter = RecordingSubmitter::default();
        let form = survey_form(FormKind::Feedback, true);
        let outcome = submit_form(&mut gate, &form, &submitter, now()).await;

        assert_eq!(
            outcome,
            SubmitOutcome {
                recorded: true,
                modal_closed: true,
                delivered: true
            }
        );
        assert!(!gate.modal_visible());
        let entries = gate.store().unwrap().entries();
        assert!(entries.contains_key(SUBMITTED_KEY));
        assert!(!entries.contains_key(SKIPPED_KEY));
        assert_eq!(submitter.sent.lock().unwrap()[0], form);
    }

    #[tokio::test]
    async fn ajax_form_in_modal_closes_it_as_a_skip() {
        let mut gate = open_gate();
        let submitter = RecordingSubmitter::default();
        let outcome = submit_form(&mut gate, &survey_form(FormKind::Ajax, true), &submitter, now()).await;

        assert!(outcome.modal_closed);
        assert!(!outcome.recorded);
        assert!(!gate.modal_visible());
        let entries = gate.store().unwrap().entries();
        assert!(entries.contains_key(SKIPPED_KEY));
        assert!(!entries.contains_key(SUBMITTED_KEY));
    }

    #[tokio::test]
    async fn feedback_form_outside_modal_only_posts() {
        let mut gate = InterstitialGate::new(Some(MemoryStore::new()));
        let submitter = RecordingSubmitter {
            fail: true,
            ..Default::default()
        };
        let outcome = submit_form(&mut gate, &survey_form(FormKind::Feedback, false), &submitter, now()).await;

        assert_eq!(outcome, SubmitOutcome::default());
        assert_eq!(submitter.sent.lock().unwrap().len(), 1);
        assert!(gate.store().unwrap().entries().is_empty());
        assert!(gate.should_show(now()));
    }
}
