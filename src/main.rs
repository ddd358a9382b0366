/*!
 * Command-line interface for repopacker
 */

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repopacker::clipboard::{Clipboard, SystemClipboard};
use repopacker::config::{Args, Config};
use repopacker::history::HistoryStore;
use repopacker::report::{PackReport, Reporter};
use repopacker::session::Session;

fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if verbose { "info" } else { "warn" }))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn print_recent(history: &HistoryStore) {
    if history.is_empty() {
        println!("No recent projects");
        return;
    }
    for entry in history.list() {
        println!(
            "{}  {}",
            entry.last_opened.format("%Y-%m-%d %H:%M"),
            entry.root.display()
        );
    }
}

fn main() -> io::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut cmd = Args::command();
        clap_complete::generate(shell, &mut cmd, "repopacker", &mut io::stdout());
        return Ok(());
    }

    init_logging(args.verbose);

    let quiet = args.quiet;
    let list_recent = args.recent;
    let config = Config::from_args(args);

    // Recent projects history; problems with it never stop a run
    let mut history = match &config.history_file {
        Some(path) => HistoryStore::load(path, config.history_capacity).unwrap_or_else(|e| {
            warn!("Ignoring recent projects history: {}", e);
            HistoryStore::in_memory(config.history_capacity)
        }),
        None => HistoryStore::in_memory(config.history_capacity),
    };

    if list_recent {
        print_recent(&history);
        return Ok(());
    }

    config.validate()?;

    let start_time = Instant::now();
    let mut session = Session::open(config.clone())?;

    if let Err(e) = history.record(session.root()) {
        warn!("Failed to update recent projects history: {}", e);
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ⏱️  {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📊 Selecting");
    progress.set_message(format!("📂 {}", session.root().display()));

    let selected = session.apply_initial_selection()?;
    info!("{} files selected", selected);

    let progress = Arc::new(progress);
    progress.set_prefix("📦 Packing");
    session.set_progress(Arc::clone(&progress));
    let doc = session.pack();
    let mut rendered = None;
    let output = match &config.output_file {
        Some(path) => {
            session.write_output(&doc, path)?;
            path.display().to_string()
        }
        None => {
            let text = session.render_document(&doc)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            rendered = Some(text);
            "stdout".to_string()
        }
    };

    let duration = start_time.elapsed();
    progress.finish_and_clear();

    if config.clip {
        let text = match rendered {
            Some(text) => text,
            None => session.render_document(&doc)?,
        };
        match SystemClipboard::detect().copy_to_clipboard(&text) {
            Ok(()) => info!("Packed document copied to clipboard"),
            Err(e) => warn!("Failed to copy to clipboard: {}", e),
        }
    }

    if !quiet {
        let report = PackReport::from_document(&doc, output, duration);
        Reporter::new().print_report(&report);
    }

    session.close();
    Ok(())
}
