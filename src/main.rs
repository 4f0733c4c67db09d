//! glimpse - Preview any file with the best available viewer.
//!
//! Usage:
//!   glimpse [PATH]             Preview a path and print the session report
//!   glimpse preview PATH       Same, with output options
//!   glimpse resolve PATH       Show which extensions would handle a path
//!   glimpse list               List installed extensions
//!   glimpse --help             Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use glimpse_core::{HostConfig, ScreenInfo};
use glimpse_host::{HeadlessWindow, Host, SessionReport, load_registry};
use glimpse_plugin::{Extension, ExtensionStatus, Resolver};

#[derive(Parser)]
#[command(
    name = "glimpse",
    version,
    about = "Preview any file with the best available viewer",
    long_about = "glimpse picks the highest-priority extension that can handle a path, \
                  runs it through prepare and view, and reports the resulting session.\n\n\
                  Scripted extensions are loaded from the user plugin directory, then \
                  from the plugins bundled next to the executable."
)]
struct Cli {
    /// Path to preview
    path: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra directory to load scripted extensions from, searched before
    /// the configured ones (repeatable)
    #[arg(short, long, global = true)]
    plugin_dir: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Preview a path and report the session
    Preview {
        /// Path to preview
        path: PathBuf,

        /// How long to wait for the viewer to finish loading
        #[arg(short, long, default_value = "2000")]
        wait_ms: u64,

        /// Screen size used for window placement (e.g., "2560x1440")
        #[arg(short, long, default_value = "1920x1080", value_parser = parse_screen)]
        screen: ScreenInfo,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the extensions that can handle a path, best first
    Resolve {
        /// Path to resolve
        path: PathBuf,
    },

    /// List installed extensions
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.plugin_dir)?;

    match cli.command {
        Some(Command::Preview {
            path,
            wait_ms,
            screen,
            format,
        }) => {
            run_preview(&config, &path, Duration::from_millis(wait_ms), screen, format).await?;
        }
        Some(Command::Resolve { path }) => {
            run_resolve(&config, &path)?;
        }
        Some(Command::List) => {
            run_list(&config);
        }
        None => {
            let Some(path) = cli.path else {
                bail!("No path given. Run `glimpse --help` for usage.");
            };
            let wait = Duration::from_secs(2);
            run_preview(&config, &path, wait, ScreenInfo::default(), OutputFormat::Text).await?;
        }
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("GLIMPSE_LOG")
                .unwrap_or_else(|_| "glimpse=info,plugin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>, plugin_dirs: Vec<PathBuf>) -> Result<HostConfig> {
    let config = match path {
        Some(path) => HostConfig::load(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
        None => HostConfig::load_default().wrap_err("Failed to load config")?,
    };

    // the first flag ends up searched first
    Ok(plugin_dirs
        .into_iter()
        .rev()
        .fold(config, |config, dir| config.with_plugin_dir(dir)))
}

/// Run one preview session on a headless window and print its report.
async fn run_preview(
    config: &HostConfig,
    path: &Path,
    wait: Duration,
    screen: ScreenInfo,
    format: OutputFormat,
) -> Result<()> {
    let path = path.canonicalize().wrap_err("Invalid path")?;
    let registry = Arc::new(load_registry(config));

    let (host, handle) = Host::new(registry, HeadlessWindow::new(), screen, config);
    let task = tokio::spawn(host.run());

    handle
        .invoke(path.clone())
        .await
        .wrap_err_with(|| format!("Could not preview {}", path.display()))?;

    let report = match tokio::time::timeout(wait, handle.ready()).await {
        Ok(report) => report,
        Err(_) => {
            warn!(wait_ms = wait.as_millis() as u64, "Viewer still loading");
            handle.report()
        }
    };

    handle.shutdown();
    task.await.wrap_err("Host task failed")?;

    let Some(report) = report else {
        bail!("Preview of {} ended before it was ready", path.display());
    };

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn print_report(report: &SessionReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", report.path.display());
    println!("{}", "─".repeat(60));
    println!(" Viewer:  {} ({})", report.extension, report.state);
    if !report.title.is_empty() {
        println!(" Title:   {}", report.title);
    }
    println!(
        " Size:    {}x{}",
        report.preferred_size.width, report.preferred_size.height
    );
    println!(" Theme:   {}", report.theme);
    if report.busy {
        println!(" Loading: yes");
    }
    if let Some(content) = &report.content {
        println!(" Content: {}", content);
    }
    println!();
}

/// Print the candidate order for a path.
fn run_resolve(config: &HostConfig, path: &Path) -> Result<()> {
    let path = path.canonicalize().wrap_err("Invalid path")?;
    let registry = load_registry(config);
    let resolver = Resolver::new(&registry);

    let mut found = false;
    for (i, extension) in resolver.candidates(&path).enumerate() {
        found = true;
        println!(
            " {}. {} (priority {})",
            i + 1,
            extension.name(),
            extension.priority()
        );
    }

    if let Some(fallback) = registry.fallback() {
        if !found {
            println!(" No extension matched; {} will be used", fallback.name());
        }
    } else if !found {
        bail!("No viewer available for {}", path.display());
    }

    Ok(())
}

/// Print every registered extension with its status.
fn run_list(config: &HostConfig) {
    let registry = load_registry(config);

    println!(" {:<24} {:>10}  STATUS", "NAME", "PRIORITY");
    for info in registry.extensions() {
        let status = match &info.status {
            ExtensionStatus::Usable => "usable".to_string(),
            ExtensionStatus::Disabled => "disabled".to_string(),
            ExtensionStatus::Failed(reason) => format!("failed: {}", reason),
        };
        println!(" {:<24} {:>10}  {}", info.name, info.priority, status);
    }
    println!();
    for dir in &config.plugin_dirs {
        println!(" Plugins: {}", dir.display());
    }
}

/// Parse a screen size like "1920x1080".
fn parse_screen(s: &str) -> Result<ScreenInfo, String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Expected WIDTHxHEIGHT, got '{}'", s))?;

    let width: f64 = width.trim().parse().map_err(|_| format!("Invalid width: {}", width))?;
    let height: f64 = height
        .trim()
        .parse()
        .map_err(|_| format!("Invalid height: {}", height))?;

    if !(width > 0.0 && height > 0.0) {
        return Err(format!("Screen size must be positive, got '{}'", s));
    }
    Ok(ScreenInfo::new(width, height))
}
