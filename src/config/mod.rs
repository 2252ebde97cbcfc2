use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    #[serde(alias = "directory")]
    pub councils: Option<String>,
    pub timeout: Option<u64>,
    pub regions: Option<Vec<String>>,
    pub listing_paths: Option<Vec<String>>,
    pub store: Option<String>,
    pub analytics_wait_ms: Option<u64>,
    pub measurement_id: Option<String>,
    pub api_secret: Option<String>,
    pub analytics_debug: Option<bool>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

fn app_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".scorecard-page"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(app_dir()?.join("config.yml"))
}

pub fn default_store_path() -> Option<PathBuf> {
    Some(app_dir()?.join("storage.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn default_config_yaml() -> String {
    r##"# scorecard-page config
#
# Location (default):
#   ~/.scorecard-page/config.yml

# Deployment origin used to resolve page paths
base_url: https://councilclimatescorecards.uk/

# Council directory (JSON array of name/slug/council_type/council_url/scoring_url)
# councils: ./councils.json

# Page fetch timeout in seconds
timeout: 10

# Regions swapped in place on partial reload
regions:
  - "#home-page-main-filter"
  - ".scorecard-table"
  - ".scorecard-table-mobile"
  - "#council-type-filter"

# Paths where back/forward re-fetches the listing
listing_paths:
  - /
  - /scoring/single/
  - /scoring/district/
  - /scoring/county/
  - /scoring/northern-ireland/
  - /scoring/combined/

# Durable key-value store for the interstitial survey gate
store: ~/.scorecard-page/storage.json

# Analytics
analytics_wait_ms: 2000
# measurement_id: G-XXXXXXXXXX
# api_secret: secret
analytics_debug: false

# Output styling
no_color: false
"##
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
