use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "scorecard-page",
    version,
    about = "headless driver for the council scorecard page controller",
    long_about = "scorecard-page runs the scorecard page behaviours outside a browser: council lookup and autocomplete, comparison URLs, table sorting, partial reloads against a live deployment, the interstitial survey gate, geolocation links and analytics events.\n\nExamples:\n  scorecard-page suggest --councils councils.json bris\n  scorecard-page select --variant compare --page '/compare/?comparisons=adur' 'Bristol City Council'\n  scorecard-page sort --page /scoring/single/ --column 2 --clicks 1\n  scorecard-page reload --page /scoring/single/ --link '?region=north-west'\n\nTip: Use --config to persist the deployment URL and council directory."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "color",
        global = true,
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output-format",
        visible_alias = "of",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format (text, json)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.scorecard-page/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'u',
        long = "base-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "Input",
        help = "Deployment origin used to resolve page paths."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "councils",
        visible_alias = "directory",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Council directory JSON file."
    )]
    pub councils: Option<String>,

    #[arg(
        long = "store",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Durable key-value store file (defaults to ~/.scorecard-page/storage.json)."
    )]
    pub store: Option<String>,

    #[arg(
        short = 'T',
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Page fetch timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Find a council by one of its fields.
    Lookup {
        #[arg(short = 'f', long = "field", default_value = "slug", help = "Field to match (name, slug, council_type, council_url, scoring_url).")]
        field: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// List autocomplete suggestions for typed text.
    Suggest {
        #[arg(long = "category", value_name = "TYPE", help = "Only list councils of this type.")]
        category: Option<String>,
        #[arg(long = "max", value_name = "N", help = "Maximum number of suggestions.")]
        max_items: Option<usize>,
        #[arg(long = "min-chars", value_name = "N", help = "Characters needed before suggesting.")]
        min_chars: Option<usize>,
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Resolve a picked council to the navigation it causes.
    Select {
        #[arg(long = "variant", default_value = "search", help = "search, jump, compare or methodology.")]
        variant: String,
        #[command(flatten)]
        page: PageArg,
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Remove a council from the comparison set.
    Uncompare {
        #[command(flatten)]
        page: PageArg,
        #[arg(value_name = "SLUG")]
        slug: String,
    },

    /// Encode or decode flat hash state.
    Codec {
        #[command(subcommand)]
        action: CodecCommand,
    },

    /// Sort a table from a page by clicking headers or by a select value.
    Sort {
        #[command(flatten)]
        source: PageSource,
        #[arg(long = "table", default_value_t = 0, value_name = "N", help = "Index of the table on the page.")]
        table: usize,
        #[arg(long = "column", value_name = "N", help = "Header to click.")]
        column: Option<usize>,
        #[arg(long = "clicks", default_value_t = 1, value_name = "N", help = "Number of clicks on --column.")]
        clicks: usize,
        #[arg(long = "by", value_name = "FIELD", allow_hyphen_values = true, help = "Select-sort field, '-' prefix for descending.")]
        by: Option<String>,
    },

    /// Run one partial reload against the deployment.
    Reload {
        #[command(flatten)]
        source: PageSource,
        #[arg(long = "link", value_name = "HREF", help = "Follow a filter link.")]
        link: Option<String>,
        #[arg(
            long = "field",
            value_name = "KEY=VALUE",
            action = ArgAction::Append,
            help = "Submit the filter form with these fields (repeatable)."
        )]
        fields: Vec<String>,
        #[arg(long = "back", help = "Follow the link, then go back in history.")]
        back: bool,
        #[arg(long = "no-fetch", help = "Behave as if fetch were unavailable.")]
        no_fetch: bool,
    },

    /// Drive the interstitial survey gate against the durable store.
    Interstitial {
        #[command(subcommand)]
        action: InterstitialCommand,
    },

    /// Build the location lookup URL, or the message shown on failure.
    Locate {
        #[arg(long = "href", default_value = "/location/", value_name = "HREF")]
        href: String,
        #[arg(long = "lon", allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        #[arg(long = "lat", allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long = "deny", conflicts_with_all = ["lon", "lat", "unavailable"], help = "Simulate a permission denial.")]
        deny: bool,
        #[arg(long = "unavailable", help = "Simulate a device with no position.")]
        unavailable: bool,
        #[arg(long = "unsupported", help = "Simulate a browser without geolocation.")]
        unsupported: bool,
    },

    /// Send an analytics event with the bounded wait.
    Track {
        #[arg(value_name = "EVENT")]
        name: String,
        #[arg(
            short = 'p',
            long = "param",
            value_name = "KEY=VALUE",
            action = ArgAction::Append,
            help = "Event parameter (repeatable)."
        )]
        params: Vec<String>,
        #[arg(long = "href", value_name = "HREF", help = "Treat as a tracked click on this link.")]
        href: Option<String>,
        #[arg(long = "modified", help = "The click used a modifier key or middle button.")]
        modified: bool,
        #[arg(long = "wait-ms", value_name = "MS", help = "Bounded analytics wait.")]
        wait_ms: Option<u64>,
        #[arg(long = "measurement-id", value_name = "ID")]
        measurement_id: Option<String>,
        #[arg(long = "api-secret", value_name = "SECRET")]
        api_secret: Option<String>,
        #[arg(long = "debug-mode", help = "Flag events for the analytics debug view.")]
        debug_mode: bool,
    },

    /// Press a copy button on a page and print what it copies.
    Copy {
        #[command(flatten)]
        source: PageSource,
        #[arg(long = "index", default_value_t = 0, value_name = "N", help = "Which copy button on the page.")]
        index: usize,
    },

    /// Submit a background form, updating the survey gate when it sits in the modal.
    Form {
        #[arg(long = "kind", default_value = "ajax", help = "ajax or feedback.")]
        kind: String,
        #[arg(long = "action", value_name = "URL", help = "Form action, resolved against the base URL.")]
        action: String,
        #[arg(long = "method", default_value = "post", value_name = "METHOD")]
        method: String,
        #[arg(
            long = "field",
            value_name = "KEY=VALUE",
            action = ArgAction::Append,
            help = "Form field (repeatable)."
        )]
        fields: Vec<String>,
        #[arg(long = "in-modal", help = "The form sits inside the survey modal.")]
        in_modal: bool,
    },

    /// Switch the content navbar section and track the switch.
    Navbar {
        #[arg(value_name = "SECTION")]
        section: String,
        #[arg(long = "wait-ms", value_name = "MS", help = "Bounded analytics wait.")]
        wait_ms: Option<u64>,
    },

    /// Write a commented default config file.
    InitConfig {
        #[arg(long = "path", value_name = "FILE")]
        path: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CodecCommand {
    Encode {
        #[arg(value_name = "KEY=VALUE", required = true)]
        pairs: Vec<String>,
    },
    Decode {
        #[arg(value_name = "RAW", allow_hyphen_values = true)]
        raw: String,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterstitialCommand {
    /// Whether the survey is due.
    Status,
    /// A watched link or form was used.
    Trigger,
    /// Page load; opens the modal when armed.
    Load,
    /// Open then close the modal without submitting.
    Dismiss,
    /// Submit the survey.
    Submit,
}

#[derive(Args, Debug, Clone)]
pub struct PageArg {
    #[arg(long = "page", default_value = "/", value_name = "URL", help = "Current page URL or path.")]
    pub page: String,
}

#[derive(Args, Debug, Clone)]
pub struct PageSource {
    #[arg(long = "page", default_value = "/", value_name = "PATH", help = "Page path on the deployment.")]
    pub page: String,
    #[arg(long = "html", value_name = "FILE", help = "Read the page from a local file instead of fetching it.")]
    pub html: Option<String>,
    #[arg(
        long = "region",
        value_name = "SELECTOR",
        action = ArgAction::Append,
        help = "Region selector (repeatable, overrides config)."
    )]
    pub regions: Vec<String>,
}
