use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use digestwatch::{
    batch::{BatchMode, BatchRunner},
    cli::{Cli, Command, WatchArgs},
    config::MonitorConfig,
    filter::FileFilter,
    pipeline::DigestPipeline,
    session::WatchSession,
    MonitorError,
};

/// Exit code for startup failures: bad configuration or an unusable watch root.
const EXIT_USAGE: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(EXIT_USAGE);
        }
    };

    cli.setup_logging(&config);

    let code = match &cli.command {
        Command::Watch(args) => run_watch_mode(args, &config)?,
        Command::Oneshot { files } => run_batch_mode(BatchMode::Write, files, &config),
        Command::Verify { files } => run_batch_mode(BatchMode::Verify, files, &config),
    };

    std::process::exit(code);
}

fn run_watch_mode(args: &WatchArgs, config: &MonitorConfig) -> Result<i32> {
    let pipeline = DigestPipeline::from_config(config).with_output(args.output);
    let filter = FileFilter::new(&config.filter);
    let mut session = WatchSession::new(&args.directory, config.watcher.clone(), filter, pipeline);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    eprintln!("Monitoring {} for finished writes (Ctrl+C to quit)", args.directory.display());

    match session.run(&running) {
        Ok(stats) => {
            eprintln!(
                "Stopped: {} digested, {} failed, {} ignored",
                stats.digested, stats.failed, stats.ignored
            );
            Ok(0)
        }
        Err(err @ MonitorError::InvalidDirectory { .. }) => {
            eprintln!("Error: {}", err);
            Ok(EXIT_USAGE)
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            Ok(1)
        }
    }
}

fn run_batch_mode(mode: BatchMode, files: &[PathBuf], config: &MonitorConfig) -> i32 {
    let runner = BatchRunner::new(DigestPipeline::from_config(config), FileFilter::new(&config.filter));
    runner.run(mode, files).exit_code()
}
