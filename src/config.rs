//! Optional config file loading. Search order: ./blogcrawl.toml, then
//! $XDG_CONFIG_HOME/blogcrawl/config.toml (or ~/.config/blogcrawl/config.toml).

use crate::filter::FilterKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; CLI flags override what is set here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct Config {
    /// Account that owns the blog.
    pub account: Option<String>,
    /// Blog identifier, usually its domain (e.g. alice.hatenablog.com).
    pub blog: Option<String>,
    /// Directory the site is written to. Relative to CWD.
    pub out_dir: Option<PathBuf>,
    /// Path the exported site is served under, e.g. "blog" for https://example.com/blog/.
    pub url_prefix: Option<String>,
    /// Title of the landing page (default: the blog identifier).
    pub blog_title: Option<String>,
    /// Feed API host (default https://blog.hatena.ne.jp).
    pub endpoint: Option<String>,
    /// Request signing: "oauth1" (default) or "wsse".
    pub auth: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Delay between feed page requests in milliseconds (default 1000).
    pub request_delay_millis: Option<u64>,
    /// Number of HTTP attempts for transient failures (default 1, no retry).
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2, 4]).
    pub retry_backoff_secs: Option<Vec<u64>>,
    /// Download images referenced by entries (default true).
    pub download_images: Option<bool>,
    /// Write category, archive and landing pages (default true).
    pub write_indexes: Option<bool>,
    /// Filters to run, in order. Default: every filter.
    pub filters: Option<Vec<FilterKind>>,
    /// Stylesheets linked from every entry page.
    pub stylesheets: Option<Vec<String>>,
    /// Scripts linked from every entry page.
    pub scripts: Option<Vec<String>>,
}

fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Load `explicit` when given (it must exist), otherwise search ./blogcrawl.toml and
/// $XDG_CONFIG_HOME/blogcrawl/config.toml. No file found returns Ok(None).
pub fn load_config(explicit: Option<&Path>) -> Result<Option<Config>, String> {
    if let Some(path) = explicit {
        return read_config(path).map(Some);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("blogcrawl.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("blogcrawl").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return read_config(path).map(Some);
        }
    }
    Ok(None)
}
