//! CLI parsing and orchestration. Parses args, merges the config file, runs the crawl and maps
//! errors to exit codes.

use crate::auth::{AuthMode, Authenticator, OAuth1, Wsse};
use crate::config::{self, Config};
use crate::crawl::{CrawlError, CrawlOptions, CrawlReport, Crawler};
use crate::feed::{
    AtomPubClient, CancelFlag, EntrySource, FeedError, FixedDelay, PoliteClient, DEFAULT_ENDPOINT,
};
use crate::filter::{AssetOptions, FilterKind, Pipeline};
use crate::path::PathResolver;
use crate::store::DirStore;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_MILLIS: u64 = 1000;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Crawl(#[from] CrawlError),

    #[error("{failed} of {total} entries could not be exported; see the log above.")]
    Incomplete { failed: usize, total: usize },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Crawl(_) => 2,
            CliRunError::Incomplete { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "blogcrawl", version)]
#[command(about = "Export every post of a hosted blog into a static HTML site")]
#[command(
    after_help = "Credentials are read from OAUTH_CONSUMER_KEY, OAUTH_CONSUMER_SECRET, OAUTH_TOKEN and OAUTH_TOKEN_SECRET (--auth oauth1) or WSSE_USERNAME and WSSE_PASSWORD (--auth wsse). Optional config: ./blogcrawl.toml or ~/.config/blogcrawl/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Account that owns the blog.
    #[arg(long, visible_alias = "hatena-id")]
    pub account: Option<String>,

    /// Blog identifier, usually its domain.
    #[arg(long, visible_alias = "blog-id")]
    pub blog: Option<String>,

    /// Directory to write the site into. Default: current directory.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Path the exported site is served under (e.g. "blog").
    #[arg(long)]
    pub url_prefix: Option<String>,

    /// Landing page title. Default: the blog identifier.
    #[arg(long)]
    pub title: Option<String>,

    /// Request signing: oauth1 (default) or wsse.
    #[arg(long)]
    pub auth: Option<AuthMode>,

    /// Feed API host.
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long, env = "OAUTH_CONSUMER_KEY", hide_env_values = true)]
    pub oauth_consumer_key: Option<String>,

    #[arg(long, env = "OAUTH_CONSUMER_SECRET", hide_env_values = true)]
    pub oauth_consumer_secret: Option<String>,

    #[arg(long, env = "OAUTH_TOKEN", hide_env_values = true)]
    pub oauth_token: Option<String>,

    #[arg(long, env = "OAUTH_TOKEN_SECRET", hide_env_values = true)]
    pub oauth_token_secret: Option<String>,

    #[arg(long, env = "WSSE_USERNAME", hide_env_values = true)]
    pub wsse_username: Option<String>,

    #[arg(long, env = "WSSE_PASSWORD", hide_env_values = true)]
    pub wsse_password: Option<String>,

    /// Do not download images referenced by entries.
    #[arg(long)]
    pub no_images: bool,

    /// Do not write category, archive and landing pages.
    #[arg(long)]
    pub no_indexes: bool,

    /// Stylesheet to link from every entry page (repeatable; added after those in the config).
    #[arg(long = "stylesheet")]
    pub stylesheets: Vec<String>,

    /// Script to link from every entry page (repeatable; added after those in the config).
    #[arg(long = "script")]
    pub scripts: Vec<String>,

    /// Delay between feed page requests in milliseconds (overrides config; default 1000).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// HTTP attempts per request for transient failures (overrides config; default 1).
    #[arg(long)]
    pub retries: Option<u32>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Config file to use instead of the default search path.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// More log output (-v info, -vv debug) and the full error chain on failure.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Set up `tracing` output on stderr. `RUST_LOG` takes precedence over the flags.
pub fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match (args.quiet, args.verbose) {
        (true, _) => "blogcrawl=error",
        (false, 0) => "blogcrawl=warn",
        (false, 1) => "blogcrawl=info",
        (false, _) => "blogcrawl=debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn required(name: &str, value: Option<String>) -> Result<String, CliRunError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        CliRunError::InvalidInput(format!(
            "--{} not set. Pass it on the command line or set `{}` in the config file.",
            name,
            name.replace('-', "_")
        ))
    })
}

fn credential(var: &str, value: &Option<String>) -> Result<String, CliRunError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CliRunError::InvalidInput(format!("{} not set", var)))
}

/// Build the request signer for `mode` from the credentials in `args`.
fn authenticator(mode: AuthMode, args: &Args) -> Result<Box<dyn Authenticator>, CliRunError> {
    Ok(match mode {
        AuthMode::OAuth1 => Box::new(OAuth1 {
            consumer_key: credential("OAUTH_CONSUMER_KEY", &args.oauth_consumer_key)?,
            consumer_secret: credential("OAUTH_CONSUMER_SECRET", &args.oauth_consumer_secret)?,
            token: credential("OAUTH_TOKEN", &args.oauth_token)?,
            token_secret: credential("OAUTH_TOKEN_SECRET", &args.oauth_token_secret)?,
            realm: String::new(),
        }),
        AuthMode::Wsse => Box::new(Wsse {
            username: credential("WSSE_USERNAME", &args.wsse_username)?,
            password: credential("WSSE_PASSWORD", &args.wsse_password)?,
        }),
    })
}

/// Settings after merging CLI flags over the config file over defaults.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    account: String,
    blog: String,
    out_dir: PathBuf,
    url_prefix: String,
    blog_title: String,
    endpoint: String,
    auth: AuthMode,
    user_agent: Option<String>,
    timeout_secs: u64,
    delay: Duration,
    retry_count: u32,
    retry_backoff_secs: Option<Vec<u64>>,
    download_images: bool,
    write_indexes: bool,
    filters: Vec<FilterKind>,
    assets: AssetOptions,
}

impl Settings {
    fn merge(args: &Args, config: Config) -> Result<Self, CliRunError> {
        let account = required("account", args.account.clone().or(config.account))?;
        let blog = required("blog", args.blog.clone().or(config.blog))?;
        let auth = match (args.auth, config.auth) {
            (Some(mode), _) => mode,
            (None, Some(name)) => name.parse().map_err(CliRunError::InvalidInput)?,
            (None, None) => AuthMode::default(),
        };
        let mut assets = AssetOptions {
            stylesheets: config.stylesheets.unwrap_or_default(),
            scripts: config.scripts.unwrap_or_default(),
        };
        assets.stylesheets.extend(args.stylesheets.iter().cloned());
        assets.scripts.extend(args.scripts.iter().cloned());

        Ok(Settings {
            out_dir: args
                .out_dir
                .clone()
                .or(config.out_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            url_prefix: args
                .url_prefix
                .clone()
                .or(config.url_prefix)
                .unwrap_or_default(),
            blog_title: args
                .title
                .clone()
                .or(config.blog_title)
                .unwrap_or_else(|| blog.clone()),
            endpoint: args
                .endpoint
                .clone()
                .or(config.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            user_agent: args.user_agent.clone().or(config.user_agent),
            timeout_secs: args
                .timeout
                .or(config.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            delay: Duration::from_millis(
                args.delay_ms
                    .or(config.request_delay_millis)
                    .unwrap_or(DEFAULT_DELAY_MILLIS),
            ),
            retry_count: args.retries.or(config.retry_count).unwrap_or(1).max(1),
            retry_backoff_secs: config.retry_backoff_secs,
            download_images: !args.no_images && config.download_images.unwrap_or(true),
            write_indexes: !args.no_indexes && config.write_indexes.unwrap_or(true),
            filters: config
                .filters
                .unwrap_or_else(|| FilterKind::STANDARD.to_vec()),
            assets,
            account,
            blog,
            auth,
        })
    }
}

fn spinner(quiet: bool) -> Option<indicatif::ProgressBar> {
    if quiet {
        return None;
    }
    let bar = indicatif::ProgressBar::new_spinner();
    let style = indicatif::ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
    bar.set_style(style);
    bar.set_message("Fetching the first feed page");
    bar.enable_steady_tick(Duration::from_millis(80));
    Some(bar)
}

fn summary(report: &CrawlReport, out_dir: &std::path::Path) -> String {
    let mut line = format!(
        "Saved {} entries, {} images and {} index pages to {}",
        report.written,
        report.images,
        report.index_pages,
        out_dir.display()
    );
    if report.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config(args.config.as_deref())
        .map_err(CliRunError::InvalidInput)?
        .unwrap_or_default();
    let settings = Settings::merge(args, config)?;
    let auth = authenticator(settings.auth, args)?;

    let mut builder = PoliteClient::builder()
        .timeout_secs(settings.timeout_secs)
        .retry_count(settings.retry_count);
    if let Some(backoff) = settings.retry_backoff_secs.clone() {
        builder = builder.retry_backoff_secs(backoff);
    }
    if let Some(ua) = settings.user_agent.clone() {
        builder = builder.user_agent(ua);
    }
    let http = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let feed = AtomPubClient::new(
        http.clone(),
        &settings.endpoint,
        &settings.account,
        &settings.blog,
        Some(auth),
    )
    .map_err(|e| match e {
        FeedError::InvalidUrl { input, reason } => CliRunError::InvalidInput(format!(
            "Invalid feed URL {}: {}. Check --endpoint, --account and --blog.",
            input, reason
        )),
        other => CliRunError::Crawl(CrawlError::Feed(other)),
    })?;
    info!(collection = %feed.collection_url(), auth = ?settings.auth, "starting crawl");

    let cancel = CancelFlag::new();
    let mut source =
        EntrySource::new(feed, FixedDelay::new(settings.delay)).with_cancel(cancel.clone());

    let progress = spinner(args.quiet);
    let on_saved = |path: &str| {
        if let Some(bar) = &progress {
            bar.set_message(format!("Saved {}", path));
        }
    };

    let pipeline = Pipeline::from_kinds(&settings.filters, &settings.assets);
    let mut crawler = Crawler::new(
        pipeline,
        PathResolver::new(&settings.url_prefix),
        DirStore::new(&settings.out_dir),
    )
    .with_options(CrawlOptions {
        write_indexes: settings.write_indexes,
        blog_title: settings.blog_title.clone(),
        on_saved: Some(&on_saved),
        cancel: Some(cancel),
    });
    if settings.download_images {
        crawler = crawler.with_images(http);
    }

    let result = crawler.run(&mut source);
    info!(pages = source.pages(), "finished reading the feed");
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }
    let report = result?;

    for failure in &report.failures {
        error!(entry = %failure.id, path = %failure.path, "{}", failure.error);
    }
    if !args.quiet {
        eprintln!("{}", summary(&report, &settings.out_dir));
    }
    if !report.failures.is_empty() {
        return Err(CliRunError::Incomplete {
            failed: report.failures.len(),
            total: report.written + report.failures.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["blogcrawl"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_flags_override_config() {
        let config = Config {
            account: Some("from-config".to_string()),
            blog: Some("blog.example.com".to_string()),
            url_prefix: Some("config-prefix".to_string()),
            request_delay_millis: Some(250),
            download_images: Some(true),
            stylesheets: Some(vec!["/base.css".to_string()]),
            ..Config::default()
        };
        let settings = Settings::merge(
            &args(&[
                "--account",
                "alice",
                "--url-prefix",
                "blog",
                "--no-images",
                "--stylesheet",
                "/extra.css",
            ]),
            config,
        )
        .unwrap();
        assert_eq!(settings.account, "alice");
        assert_eq!(settings.blog, "blog.example.com");
        assert_eq!(settings.blog_title, "blog.example.com");
        assert_eq!(settings.url_prefix, "blog");
        assert_eq!(settings.delay, Duration::from_millis(250));
        assert!(!settings.download_images);
        assert!(settings.write_indexes);
        assert_eq!(settings.assets.stylesheets, ["/base.css", "/extra.css"]);
        assert_eq!(settings.filters, FilterKind::STANDARD.to_vec());
    }

    #[test]
    fn defaults_without_config() {
        let settings =
            Settings::merge(&args(&["--account", "a", "--blog", "b"]), Config::default()).unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.out_dir, PathBuf::from("."));
        assert_eq!(settings.delay, Duration::from_secs(1));
        assert_eq!(settings.retry_count, 1);
        assert_eq!(settings.auth, AuthMode::OAuth1);
    }

    #[test]
    fn missing_account_is_invalid_input() {
        let err = Settings::merge(&args(&["--blog", "b"]), Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("--account"));
    }

    #[test]
    fn unknown_auth_in_config_is_invalid_input() {
        let config = Config {
            auth: Some("basic".to_string()),
            ..Config::default()
        };
        let err = Settings::merge(&args(&["--account", "a", "--blog", "b"]), config).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn wsse_requires_both_credentials() {
        let parsed = args(&["--wsse-username", "alice"]);
        let err = authenticator(AuthMode::Wsse, &parsed).err().unwrap();
        assert_eq!(err.to_string(), "WSSE_PASSWORD not set");
    }

    #[test]
    fn oauth1_credentials_from_flags() {
        let parsed = args(&[
            "--oauth-consumer-key",
            "ck",
            "--oauth-consumer-secret",
            "cs",
            "--oauth-token",
            "t",
            "--oauth-token-secret",
            "ts",
        ]);
        assert!(authenticator(AuthMode::OAuth1, &parsed).is_ok());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(CliRunError::InvalidInput(String::new()).exit_code(), 1);
        let feed = FeedError::Decode {
            page: None,
            reason: String::new(),
        };
        assert_eq!(CliRunError::Crawl(CrawlError::Feed(feed)).exit_code(), 2);
        assert_eq!(
            CliRunError::Incomplete {
                failed: 1,
                total: 3
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn summary_mentions_counts() {
        let report = CrawlReport {
            written: 3,
            images: 2,
            index_pages: 4,
            ..CrawlReport::default()
        };
        assert_eq!(
            summary(&report, std::path::Path::new("public")),
            "Saved 3 entries, 2 images and 4 index pages to public"
        );
    }
}
