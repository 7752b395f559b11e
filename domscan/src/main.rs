//! domscan CLI Application
//!
//! Checks domain availability over WHOIS using domscan-lib. Names come from
//! arguments or piped text; records are printed as soon as each lookup finishes.

mod input;
mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use domscan_lib::{
    apply_env_config, apply_file_config, load_env_config, parse_timeout_string, ConfigManager,
    EnvConfig, FileConfig, LookupConfig, WhoisChecker, MAX_PARALLELISM,
};
use futures::StreamExt;
use std::process;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Command line interface for domscan
#[derive(Parser, Debug)]
#[command(name = "domscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check domain availability over WHOIS")]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Every command the binary understands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the availability of domains
    #[command(
        long_about = "Check the availability of domains. Full domain names are required.\n\nSeparate multiple names with commas or spaces, or pipe them on stdin.\n\nExamples:\n  domscan check example.com\n  domscan check example.com example.org\n  cat names.txt | domscan check"
    )]
    Check(CheckArgs),
}

/// Arguments for `domscan check`
#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Domain names to check (comma or space separated)
    #[arg(value_name = "NAMES", help_heading = "Domain Selection")]
    pub names: Vec<String>,

    /// Show the WHOIS response of each domain
    #[arg(short = 'w', long = "whois", help_heading = "Output Format")]
    pub whois: bool,

    /// Show per-domain elapsed seconds and the total running time
    #[arg(short = 'b', long = "benchmark", help_heading = "Output Format")]
    pub benchmark: bool,

    /// Print one JSON object per line
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Number of concurrent workers (default: 4, max: 100)
    #[arg(
        short = 'p',
        long = "parallel",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub parallel: Option<usize>,

    /// Per-domain timeout, e.g. "5s", "2m" or "0" for none (default: 10s)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DURATION",
        help_heading = "Performance"
    )]
    pub timeout: Option<String>,

    /// WHOIS server for TLDs missing from the built-in table
    #[arg(long = "server", value_name = "HOST", help_heading = "Protocol")]
    pub server: Option<String>,

    /// Do not ask IANA for the WHOIS server of unknown TLDs
    #[arg(long = "no-discover", help_heading = "Protocol")]
    pub no_discover: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

impl Cli {
    fn verbose(&self) -> bool {
        match &self.command {
            Command::Check(args) => args.verbose,
        }
    }
}

/// Resolved settings for one `check` run.
#[derive(Debug, Clone)]
struct CheckSettings {
    lookup: LookupConfig,
    show_whois: bool,
    benchmark: bool,
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose());

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Dispatch a parsed command line.
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Check(args) => run_check(args).await,
    }
}

async fn run_check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();

    validate_args(&args)?;

    let names = input::collect_names(&args.names, input::read_piped_stdin());
    if names.is_empty() {
        return Err("No domain name is given".into());
    }

    let settings = build_settings(&args, &load_env_config())?;
    let parallelism = settings.lookup.effective_parallelism();
    debug!(
        domains = names.len(),
        parallelism,
        timeout = ?settings.lookup.timeout,
        "Starting lookups"
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let checker = WhoisChecker::with_config(settings.lookup.clone());
    let total = names.len();
    let mut records = checker.lookup_multiple(Some(cancel), names, parallelism);
    let mut tally = ui::Tally::default();

    while let Some(record) = records.next().await {
        tally.record(&record);
        if settings.json {
            ui::print_json_record(&record, settings.show_whois)?;
        } else {
            ui::print_record(&record, settings.benchmark, settings.show_whois);
        }
    }

    let duration = start_time.elapsed();
    if !settings.json {
        if total > 1 {
            ui::print_summary(&tally, duration);
        }
        if settings.benchmark {
            ui::print_running_time(duration);
        }
    }

    Ok(())
}

/// Cancel outstanding lookups on Ctrl-C. Cancelled names are still reported.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    warn!("Interrupted, cancelling outstanding lookups");
                    cancel.cancel();
                }
            }
            _ = cancel.cancelled() => {}
        }
    });
}

/// Validate command line arguments
fn validate_args(args: &CheckArgs) -> Result<(), String> {
    if let Some(parallel) = args.parallel {
        if parallel == 0 || parallel > MAX_PARALLELISM {
            return Err(format!("Parallel must be between 1 and {}", MAX_PARALLELISM));
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    if let Some(server) = &args.server {
        if server.trim().is_empty() {
            return Err("Server cannot be empty".to_string());
        }
    }

    Ok(())
}

/// Build the run settings.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (DOMSCAN_*)
/// 3. Local config file (./domscan.toml or ./.domscan.toml)
/// 4. Global config file (~/.domscan.toml)
/// 5. XDG config file (~/.config/domscan/config.toml)
/// 6. Built-in defaults
fn build_settings(
    args: &CheckArgs,
    env_config: &EnvConfig,
) -> Result<CheckSettings, Box<dyn std::error::Error>> {
    let file_config = load_file_config(args, env_config)?;
    let defaults = file_config.defaults.clone().unwrap_or_default();

    let mut settings = CheckSettings {
        lookup: apply_file_config(LookupConfig::default(), &file_config),
        show_whois: defaults.show_whois.unwrap_or(false),
        benchmark: defaults.benchmark.unwrap_or(false),
        json: defaults.json.unwrap_or(false),
    };

    settings.lookup = apply_env_config(settings.lookup, env_config);
    if let Some(json) = env_config.json {
        settings.json = json;
    }

    apply_cli_args(settings, args)
}

fn load_file_config(
    args: &CheckArgs,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit = args
        .config
        .as_deref()
        .map(|path| (path, "--config"))
        .or_else(|| env_config.config.as_deref().map(|path| (path, "DOMSCAN_CONFIG")));

    match explicit {
        Some((path, source)) => {
            debug!(path, source, "Using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e).into())
        }
        None => match config_manager.discover_and_load() {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "Config discovery failed, using defaults");
                Ok(FileConfig::default())
            }
        },
    }
}

fn apply_cli_args(
    mut settings: CheckSettings,
    args: &CheckArgs,
) -> Result<CheckSettings, Box<dyn std::error::Error>> {
    if let Some(parallel) = args.parallel {
        settings.lookup = settings.lookup.with_parallelism(parallel);
    }

    if let Some(timeout) = &args.timeout {
        let timeout = parse_timeout_string(timeout)
            .ok_or_else(|| format!("Invalid timeout '{}'", timeout))?;
        settings.lookup = settings.lookup.with_timeout(timeout);
    }

    if let Some(server) = &args.server {
        settings.lookup = settings
            .lookup
            .with_default_server(Some(server.trim().to_string()));
    }

    if args.no_discover {
        settings.lookup = settings.lookup.with_discovery(false);
    }

    settings.show_whois |= args.whois;
    settings.benchmark |= args.benchmark;
    settings.json |= args.json;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use domscan_lib::DEFAULT_PARALLELISM;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    // Helper function with all required fields
    fn create_test_args() -> CheckArgs {
        CheckArgs {
            names: vec![],
            whois: false,
            benchmark: false,
            json: false,
            parallel: None,
            timeout: None,
            server: None,
            no_discover: false,
            config: None,
            verbose: false,
        }
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_command() {
        let cli = Cli::try_parse_from([
            "domscan", "check", "-w", "-b", "-p", "8", "-t", "3s", "example.com", "example.org",
        ])
        .unwrap();

        let Command::Check(args) = cli.command;
        assert!(args.whois);
        assert!(args.benchmark);
        assert_eq!(args.parallel, Some(8));
        assert_eq!(args.timeout.as_deref(), Some("3s"));
        assert_eq!(args.names, vec!["example.com", "example.org"]);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["domscan", "search", "example"]).is_err());
    }

    #[test]
    fn test_validate_args() {
        let mut args = create_test_args();
        assert!(validate_args(&args).is_ok());

        args.parallel = Some(0);
        assert!(validate_args(&args).is_err());

        args.parallel = Some(MAX_PARALLELISM + 1);
        assert!(validate_args(&args).is_err());

        args.parallel = Some(10);
        args.timeout = Some("soon".to_string());
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_defaults_without_config() {
        let file = config_file("");
        let mut args = create_test_args();
        args.config = Some(file.path().to_string_lossy().into_owned());

        let settings = build_settings(&args, &EnvConfig::default()).unwrap();
        assert_eq!(settings.lookup.parallelism, DEFAULT_PARALLELISM);
        assert_eq!(settings.lookup.timeout, Some(Duration::from_secs(10)));
        assert!(!settings.show_whois);
        assert!(!settings.benchmark);
        assert!(!settings.json);
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let file = config_file(
            r#"
[defaults]
parallel = 6
timeout = "20s"
default_server = "whois.file.test"
show_whois = true
"#,
        );

        let mut args = create_test_args();
        args.config = Some(file.path().to_string_lossy().into_owned());

        // File only
        let settings = build_settings(&args, &EnvConfig::default()).unwrap();
        assert_eq!(settings.lookup.parallelism, 6);
        assert_eq!(settings.lookup.timeout, Some(Duration::from_secs(20)));
        assert_eq!(
            settings.lookup.default_server.as_deref(),
            Some("whois.file.test")
        );
        assert!(settings.show_whois);

        // Env beats file
        let env_config = EnvConfig {
            parallel: Some(12),
            server: Some("whois.env.test".to_string()),
            json: Some(true),
            ..Default::default()
        };
        let settings = build_settings(&args, &env_config).unwrap();
        assert_eq!(settings.lookup.parallelism, 12);
        assert_eq!(
            settings.lookup.default_server.as_deref(),
            Some("whois.env.test")
        );
        assert!(settings.json);

        // CLI beats env
        args.parallel = Some(2);
        args.timeout = Some("0".to_string());
        args.server = Some("whois.cli.test".to_string());
        let settings = build_settings(&args, &env_config).unwrap();
        assert_eq!(settings.lookup.parallelism, 2);
        assert_eq!(settings.lookup.timeout, None);
        assert_eq!(
            settings.lookup.default_server.as_deref(),
            Some("whois.cli.test")
        );
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let mut args = create_test_args();
        args.config = Some("/nonexistent/domscan.toml".to_string());
        assert!(build_settings(&args, &EnvConfig::default()).is_err());
    }

    #[test]
    fn test_env_config_path_used_when_no_flag() {
        let file = config_file("[defaults]\nbenchmark = true\n");
        let env_config = EnvConfig {
            config: Some(file.path().to_string_lossy().into_owned()),
            ..Default::default()
        };
        let settings = build_settings(&create_test_args(), &env_config).unwrap();
        assert!(settings.benchmark);
    }

    #[test]
    fn test_no_discover_flag() {
        let file = config_file("");
        let mut args = create_test_args();
        args.config = Some(file.path().to_string_lossy().into_owned());
        let settings = build_settings(&args, &EnvConfig::default()).unwrap();
        assert!(settings.lookup.discover_servers);

        args.no_discover = true;
        let settings = build_settings(&args, &EnvConfig::default()).unwrap();
        assert!(!settings.lookup.discover_servers);
    }

    #[test]
    fn test_no_discover_overrides_config_file() {
        let file = config_file("[defaults]\ndiscover_servers = true\n");
        let mut args = create_test_args();
        args.config = Some(file.path().to_string_lossy().into_owned());
        args.no_discover = true;
        let settings = build_settings(&args, &EnvConfig::default()).unwrap();
        assert!(!settings.lookup.discover_servers);
    }
}
