use std::path::PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::{Backend, MonitorConfig};
use crate::error::MonitorError;

#[derive(Parser)]
#[command(name = "digestwatch")]
#[command(version)]
#[command(about = "Records a SHA-256 digest beside every file once it finishes being written")]
#[command(long_about = "digestwatch watches a directory tree and, whenever a file is closed after writing, stores its SHA-256 digest in a `<file>.sha256` sidecar and, where supported, in the `user.sha256` extended attribute. Batch modes write or verify digests for an explicit list of files.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, global = true, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Skip the extended attribute sink
    #[arg(long, global = true, help = "Do not write the user.sha256 extended attribute")]
    pub no_xattr: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch a directory and digest files as they are closed
    Watch(WatchArgs),
    /// Write sidecars for the given files (directories are expanded)
    Oneshot {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Check the given files against their sidecars
    Verify {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
pub struct WatchArgs {
    /// Directory to watch recursively
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Watch mode - how to receive file events
    #[arg(short, long, help = "File watching mode")]
    pub mode: Option<WatchMode>,

    /// Polling interval in milliseconds (for polling mode)
    #[arg(long, help = "Polling interval in ms")]
    pub poll_interval: Option<u64>,

    /// Quiet period before a modified file counts as finished
    #[arg(long, help = "Settle time in ms for backends without close events")]
    pub settle: Option<u64>,

    /// Output format for digest records
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WatchMode {
    /// Automatic detection (native events with polling fallback)
    Auto,
    /// Use native file system events
    Native,
    /// Use polling-based watching
    Polling,
}

impl From<WatchMode> for Backend {
    fn from(mode: WatchMode) -> Self {
        match mode {
            WatchMode::Auto => Backend::Auto,
            WatchMode::Native => Backend::Native,
            WatchMode::Polling => Backend::Polling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `<digest>  <path>`, as `sha256sum` prints
    #[default]
    Text,
    /// JSON record per line for scripting
    Json,
}

impl Cli {
    /// Builds the effective configuration: file, environment, then flags.
    pub fn load_config(&self) -> Result<MonitorConfig, MonitorError> {
        let mut config = MonitorConfig::load(self.config.as_deref())?;

        if self.no_xattr {
            config.sinks.attributes = false;
        }

        if let Command::Watch(args) = &self.command {
            if let Some(mode) = args.mode {
                config.watcher.backend = mode.into();
            }
            if let Some(ms) = args.poll_interval {
                config.watcher.poll_interval_ms = ms;
            }
            if let Some(ms) = args.settle {
                config.watcher.settle_ms = ms;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn setup_logging(&self, config: &MonitorConfig) {
        let default_level = if self.verbose { "debug" } else { "info" };
        let filter = config
            .log_filter
            .as_deref()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(default_level));

        // Digest records own stdout; diagnostics go to stderr.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}
