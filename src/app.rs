use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{error::ErrorKind, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::analytics::{self, AnalyticsEvent, EventSink, MeasurementCredentials, Modifiers};
use crate::autocomplete::{Autocomplete, AutocompleteOptions, Variant};
use crate::cli::args::{CliArgs, CodecCommand, Command, InterstitialCommand, PageSource};
use crate::cli::validation;
use crate::clipboard::{self, MemoryClipboard};
use crate::codec::{self, StateMap};
use crate::config::{self, ConfigFile};
use crate::document::{self, Document, DEFAULT_REGIONS};
use crate::geolocate::{self, FixedGeolocator, GeolocateError, GeolocateOptions, Geolocator};
use crate::interstitial::{
    self, AjaxForm, FileStore, FormKind, HttpFormSubmitter, InterstitialGate,
};
use crate::output::{self, GateView, OutputFormat, ReloadView, Report, TableView};
use crate::registry::{CouncilField, Registry};
use crate::reload::{
    self, Fetcher, HttpFetcher, NoFetch, ReloadController, SessionHistory, Trigger,
};
use crate::state::{self, Action, PageState};
use crate::toggle::ContentNavbar;

pub const DEFAULT_BASE_URL: &str = "https://councilclimatescorecards.uk/";

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    verbose: u8,
    no_color: bool,
    format: OutputFormat,
    base_url: String,
    councils: Option<String>,
    timeout: u64,
    regions: Vec<String>,
    listing_paths: Vec<String>,
    store_path: PathBuf,
    analytics_wait: Duration,
    measurement: Option<MeasurementCredentials>,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };
    let format = match args.output_format.as_deref() {
        Some(raw) => OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --output-format '{raw}'"))?,
        None => OutputFormat::Text,
    };

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    url::Url::parse(&base_url).map_err(|e| format!("invalid base_url '{base_url}': {e}"))?;

    let councils = args
        .councils
        .or(cfg.councils)
        .map(|p| config::expand_tilde_string(&p));
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    let regions = cfg
        .regions
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect());
    let listing_paths = cfg
        .listing_paths
        .filter(|p| !p.is_empty())
        .unwrap_or_else(reload::default_listing_paths);

    let store_path = match args.store.or(cfg.store) {
        Some(p) => config::expand_tilde(&p),
        None => config::default_store_path()
            .ok_or_else(|| "cannot determine home directory for the store file".to_string())?,
    };

    let analytics_wait = Duration::from_millis(cfg.analytics_wait_ms.unwrap_or(2000));
    let analytics_debug = cfg.analytics_debug.unwrap_or(false);
    let (measurement_id, api_secret, debug_mode) = match &args.command {
        Command::Track {
            measurement_id,
            api_secret,
            debug_mode,
            ..
        } => (
            measurement_id.clone().or(cfg.measurement_id),
            api_secret.clone().or(cfg.api_secret),
            *debug_mode || analytics_debug,
        ),
        _ => (cfg.measurement_id, cfg.api_secret, analytics_debug),
    };
    let measurement = match (measurement_id, api_secret) {
        (Some(measurement_id), Some(api_secret)) => Some(MeasurementCredentials {
            measurement_id,
            api_secret,
            debug: debug_mode,
        }),
        _ => None,
    };

    Ok(RunConfig {
        command: args.command,
        verbose: args.verbose,
        no_color,
        format,
        base_url,
        councils,
        timeout,
        regions,
        listing_paths,
        store_path,
        analytics_wait,
        measurement,
    })
}

fn init_tracing(verbose: u8, no_color: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scorecard_page={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed_precise}]")
            .map_err(|e| format!("failed to build spinner style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

async fn load_registry(run: &RunConfig) -> Result<Registry, String> {
    let path = run.councils.as_deref().ok_or_else(|| {
        "no council directory configured (use --councils or 'councils' in the config)".to_string()
    })?;
    let registry = Registry::load(path).await.map_err(|e| e.to_string())?;
    debug!(councils = registry.len(), path, "loaded council directory");
    Ok(registry)
}

fn parse_page(raw: &str) -> Result<PageState, String> {
    PageState::parse(raw).map_err(|e| e.to_string())
}

async fn load_page(run: &RunConfig, source: &PageSource) -> Result<String, String> {
    if let Some(path) = source.html.as_deref() {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read page file {path}: {e}"));
    }
    let fetcher = HttpFetcher::new(&run.base_url, run.timeout).map_err(|e| e.to_string())?;
    let pb = spinner(&format!("fetching {}", source.page))?;
    let result = fetcher.fetch(&source.page).await;
    pb.finish_and_clear();
    result.map_err(|e| e.to_string())
}

fn regions_for(run: &RunConfig, source: &PageSource) -> Vec<String> {
    if source.regions.is_empty() {
        run.regions.clone()
    } else {
        source.regions.clone()
    }
}

fn parse_pairs(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|p| crate::utils::parse_key_value(p).map_err(|e| format!("invalid pair '{p}': {e}")))
        .collect()
}

async fn run_sort(
    run: &RunConfig,
    source: &PageSource,
    table: usize,
    column: Option<usize>,
    clicks: usize,
    by: Option<&str>,
) -> Result<Report, String> {
    let html = load_page(run, source).await?;
    let mut tables = document::parse_tables(&html).map_err(|e| e.to_string())?;
    let found = tables.len();
    let target = tables
        .get_mut(table)
        .ok_or_else(|| format!("page has {found} sortable tables, no table {table}"))?;
    match (column, by) {
        (_, Some(order)) => {
            if !target.sort_by_field(order) {
                return Err(format!("no column sorts by field '{order}'"));
            }
        }
        (Some(column), None) => {
            for _ in 0..clicks {
                if !target.click(column) {
                    return Err(format!("column {column} is not sortable"));
                }
            }
        }
        (None, None) => return Err("sort needs --column or --by".to_string()),
    }
    Ok(Report::Table(TableView::from(&*target)))
}

async fn run_reload(
    run: &RunConfig,
    source: &PageSource,
    link: Option<&str>,
    fields: &[String],
    back: bool,
    no_fetch: bool,
) -> Result<Report, String> {
    let html = load_page(run, source).await?;
    let document = Document::parse(&html, &regions_for(run, source)).map_err(|e| e.to_string())?;
    let page = parse_page(&source.page)?;
    let start = page.path_and_query();
    let mut controller = ReloadController::new(
        page,
        document,
        SessionHistory::new(&start),
        run.listing_paths.clone(),
    );

    let trigger = match link {
        Some(href) => Trigger::FilterLink {
            href: href.to_string(),
        },
        None => Trigger::FormSubmit {
            fields: parse_pairs(fields)?,
        },
    };
    let fetcher: Box<dyn Fetcher> = if no_fetch {
        Box::new(NoFetch)
    } else {
        Box::new(HttpFetcher::new(&run.base_url, run.timeout).map_err(|e| e.to_string())?)
    };

    let pb = spinner("partial reload")?;
    let mut outcome = controller.handle(&trigger, fetcher.as_ref()).await;
    if back {
        if let Some(url) = controller.navigator_mut().back() {
            pb.set_message(format!("back to {url}"));
            outcome = controller
                .handle(&Trigger::PopState { url }, fetcher.as_ref())
                .await;
        }
    }
    pb.finish_and_clear();

    Ok(Report::Reload(ReloadView {
        outcome,
        history: controller.navigator().entries().to_vec(),
        full_navigations: controller.navigator().full_navigations().to_vec(),
        tables: controller
            .document()
            .tables()
            .iter()
            .map(TableView::from)
            .collect(),
    }))
}

fn run_interstitial(run: &RunConfig, action: InterstitialCommand) -> Result<Report, String> {
    let store = FileStore::open(&run.store_path).map_err(|e| e.to_string())?;
    let mut gate = InterstitialGate::new(Some(store));
    let now = Utc::now();
    match action {
        InterstitialCommand::Status => {}
        InterstitialCommand::Trigger => {
            gate.handle_trigger(now);
        }
        InterstitialCommand::Load => {
            if gate.on_page_load() {
                gate.modal_shown();
            }
        }
        InterstitialCommand::Dismiss => {
            if gate.on_page_load() {
                gate.modal_shown();
                gate.modal_hidden(now);
            }
        }
        InterstitialCommand::Submit => {
            if gate.on_page_load() {
                gate.modal_shown();
            }
            gate.record_submission(now);
        }
    }
    Ok(Report::Gate(gate_view(
        &gate,
        &format!("{action:?}").to_lowercase(),
        now,
    )))
}

fn gate_view(gate: &InterstitialGate<FileStore>, action: &str, now: DateTime<Utc>) -> GateView {
    GateView {
        action: action.to_string(),
        should_show: gate.should_show(now),
        modal_visible: gate.modal_visible(),
        entries: gate
            .store()
            .map(|s| s.entries().clone())
            .unwrap_or_default(),
    }
}

async fn run_form(
    run: &RunConfig,
    kind: &str,
    action: &str,
    method: &str,
    fields: &[String],
    in_modal: bool,
) -> Result<Report, String> {
    let kind = FormKind::parse(kind).ok_or_else(|| format!("invalid --kind '{kind}'"))?;
    let form = AjaxForm {
        kind,
        method: method.to_string(),
        action: action.to_string(),
        fields: parse_pairs(fields)?,
        in_modal,
    };
    let store = FileStore::open(&run.store_path).map_err(|e| e.to_string())?;
    let mut gate = InterstitialGate::new(Some(store));
    if in_modal && gate.on_page_load() {
        gate.modal_shown();
    }
    let submitter = HttpFormSubmitter::new(&run.base_url, run.timeout).map_err(|e| e.to_string())?;
    let now = Utc::now();
    let pb = spinner(&format!("submitting {action}"))?;
    let outcome = interstitial::submit_form(&mut gate, &form, &submitter, now).await;
    pb.finish_and_clear();
    Ok(Report::Form {
        outcome,
        gate: gate_view(&gate, "form", now),
    })
}

fn event_sink(run: &RunConfig) -> Result<Box<dyn EventSink>, String> {
    let sink: Box<dyn EventSink> = match run.measurement.clone() {
        Some(creds) => Box::new(
            analytics::MeasurementProtocolSink::new(Some(creds), Duration::from_secs(run.timeout))
                .map_err(|e| e.to_string())?,
        ),
        None => Box::new(analytics::TracingSink),
    };
    Ok(sink)
}

async fn run_locate(
    href: &str,
    lon: Option<f64>,
    lat: Option<f64>,
    deny: bool,
    unavailable: bool,
    unsupported: bool,
) -> Result<Report, String> {
    let device = if unsupported {
        None
    } else if deny {
        Some(FixedGeolocator::failing(GeolocateError::PermissionDenied))
    } else if unavailable {
        Some(FixedGeolocator::failing(GeolocateError::Unavailable))
    } else {
        match (lon, lat) {
            (Some(lon), Some(lat)) => Some(FixedGeolocator::at(lon, lat)),
            _ => {
                return Err(
                    "locate needs --lon/--lat, --deny, --unavailable or --unsupported".to_string(),
                )
            }
        }
    };
    let outcome = geolocate::locate(
        href,
        device.as_ref().map(|d| d as &dyn Geolocator),
        &GeolocateOptions::default(),
    )
    .await;
    Ok(Report::Locate(outcome))
}

async fn dispatch(run: &RunConfig) -> Result<Report, String> {
    match &run.command {
        Command::Lookup { field, value } => {
            let field = CouncilField::parse(field).ok_or_else(|| format!("invalid --field '{field}'"))?;
            let registry = load_registry(run).await?;
            Ok(Report::Council(registry.find(field, value).cloned()))
        }
        Command::Suggest {
            category,
            max_items,
            min_chars,
            text,
        } => {
            let registry = load_registry(run).await?;
            let mut options = AutocompleteOptions::new(Variant::Search);
            options.category = category.clone();
            if let Some(n) = max_items {
                options.max_items = *n;
            }
            if let Some(n) = min_chars {
                options.min_chars = *n;
            }
            let ac = Autocomplete::attach(&registry, options);
            Ok(Report::Suggestions(ac.suggest(text)))
        }
        Command::Select {
            variant,
            page,
            text,
        } => {
            let variant =
                Variant::parse(variant).ok_or_else(|| format!("invalid --variant '{variant}'"))?;
            let registry = load_registry(run).await?;
            let page = parse_page(&page.page)?;
            let ac = Autocomplete::attach(&registry, AutocompleteOptions::new(variant));
            Ok(Report::Effect(ac.select(text, &registry, &page)))
        }
        Command::Uncompare { page, slug } => {
            let page = parse_page(&page.page)?;
            Ok(Report::Url(state::compute_next_url(
                &page,
                &Action::RemoveComparison(slug.clone()),
            )))
        }
        Command::Codec { action } => match action {
            CodecCommand::Encode { pairs } => {
                let map: StateMap = parse_pairs(pairs)?.into_iter().collect();
                Ok(Report::Encoded(codec::encode(&map)))
            }
            CodecCommand::Decode { raw } => {
                let raw = raw.strip_prefix('#').unwrap_or(raw);
                codec::decode(raw)
                    .map(Report::Decoded)
                    .map_err(|e| e.to_string())
            }
        },
        Command::Sort {
            source,
            table,
            column,
            clicks,
            by,
        } => run_sort(run, source, *table, *column, *clicks, by.as_deref()).await,
        Command::Reload {
            source,
            link,
            fields,
            back,
            no_fetch,
        } => run_reload(run, source, link.as_deref(), fields, *back, *no_fetch).await,
        Command::Interstitial { action } => run_interstitial(run, *action),
        Command::Locate {
            href,
            lon,
            lat,
            deny,
            unavailable,
            unsupported,
        } => run_locate(href, *lon, *lat, *deny, *unavailable, *unsupported).await,
        Command::Track {
            name,
            params,
            href,
            modified,
            wait_ms,
            ..
        } => {
            let mut event = AnalyticsEvent::new(name);
            for (k, v) in parse_pairs(params)? {
                event = event.param(&k, v);
            }
            let sink = event_sink(run)?;
            let wait = wait_ms.map(Duration::from_millis).unwrap_or(run.analytics_wait);
            let modifiers = Modifiers {
                ctrl: *modified,
                ..Default::default()
            };
            let click =
                analytics::tracked_click(sink.as_ref(), &event, href.as_deref(), modifiers, wait)
                    .await;
            Ok(Report::Track { event, click })
        }
        Command::Copy { source, index } => {
            let html = load_page(run, source).await?;
            let mut board = MemoryClipboard::default();
            clipboard::copy_text(&html, *index, &mut board)
                .map(Report::Copied)
                .map_err(|e| e.to_string())
        }
        Command::Form {
            kind,
            action,
            method,
            fields,
            in_modal,
        } => run_form(run, kind, action, method, fields, *in_modal).await,
        Command::Navbar { section, wait_ms } => {
            let mut navbar = ContentNavbar::default();
            let event = navbar.switch(section);
            let sink = event_sink(run)?;
            let wait = wait_ms.map(Duration::from_millis).unwrap_or(run.analytics_wait);
            let click =
                analytics::tracked_click(sink.as_ref(), &event, None, Modifiers::default(), wait)
                    .await;
            Ok(Report::Track { event, click })
        }
        Command::InitConfig { path } => {
            let path = match path {
                Some(p) => config::expand_tilde(p),
                None => config::default_config_path()
                    .ok_or_else(|| "cannot determine home directory for the config file".to_string())?,
            };
            let created = config::ensure_default_config_file(&path)?;
            Ok(Report::ConfigWritten {
                path: path.display().to_string(),
                created,
            })
        }
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    let report = dispatch(&run).await?;
    println!("{}", output::render(&report, run.format)?);
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    init_tracing(run.verbose, run.no_color);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
