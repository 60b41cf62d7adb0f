//! Command-line interface module for dlsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Loading and validating configuration
//! - Running the batch (or dry run) with progress output
//! - Printing the human or JSON report

use crate::config::{ConfigError, Configuration, Settings};
use crate::file_organizer::{BatchReport, OrganizeError, Organizer};
use crate::output::{OutputFormatter, plural};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

/// Sort the top level of a directory into category subdirectories.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "dlsort", version, about, long_about = None)]
pub struct Cli {
    /// Directory to organize (default: configured root, then ~/Downloads)
    pub directory: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show where files would go without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Errors that stop the CLI before or instead of a report.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error("Failed to render report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),
}

impl Cli {
    /// The log level used when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    fn shows_human_output(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Runs the CLI application and returns the batch report.
///
/// A report with failures is still `Ok`; callers decide the exit status from
/// [`BatchReport::is_success`].
///
/// # Examples
///
/// ```no_run
/// use dlsort::cli::{Cli, run_cli};
///
/// let cli = Cli { dry_run: true, ..Default::default() };
/// match run_cli(&cli) {
///     Ok(report) => println!("{} file(s) would move", report.moved.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<BatchReport, CliError> {
    let settings = Settings::load(cli.config.as_deref())?;
    let config = settings.build(cli.directory.as_deref())?;

    warn_about_overlaps(&config);

    let organizer = Organizer::new(&config);
    let report = if cli.dry_run {
        if cli.shows_human_output() {
            OutputFormatter::dry_run_notice(&format!(
                "Analyzing contents of: {}",
                config.root().display()
            ));
        }
        organizer.plan()?
    } else {
        if cli.shows_human_output() {
            OutputFormatter::info(&format!(
                "Organizing contents of: {}",
                config.root().display()
            ));
        }
        organize_with_progress(&organizer, cli.shows_human_output())?
    };

    if cli.json {
        write_json(&report, &mut io::stdout().lock())?;
    } else if !cli.quiet {
        print_report(&report, &config);
    }

    Ok(report)
}

/// Logs one warning per extension claimed by several categories and returns
/// how many there were.
pub fn warn_about_overlaps(config: &Configuration) -> usize {
    for overlap in config.overlaps() {
        tracing::warn!("{overlap}");
    }
    config.overlaps().len()
}

/// Writes the report as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write>(report: &BatchReport, out: &mut W) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, &report.to_json())?;
    writeln!(out)?;
    Ok(())
}

fn organize_with_progress(
    organizer: &Organizer<'_>,
    show_progress: bool,
) -> Result<BatchReport, OrganizeError> {
    organizer.prepare_directories()?;
    let scan = organizer.scan()?;

    let pb = if show_progress {
        OutputFormatter::create_progress_bar(scan.tasks.len() as u64)
    } else {
        indicatif::ProgressBar::hidden()
    };

    let report = organizer.run_batch(scan, |task| {
        pb.set_message(task.display_name().into_owned());
        let result = organizer.relocate(task);
        pb.inc(1);
        result
    })?;

    pb.finish_and_clear();
    Ok(report)
}

fn print_report(report: &BatchReport, config: &Configuration) {
    if report.dry_run {
        if report.moved.is_empty() && report.failures.is_empty() {
            OutputFormatter::plain("No files found to organize.");
            return;
        }

        OutputFormatter::header("Files would be organized as follows:");
        for planned in &report.moved {
            let name = planned
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            OutputFormatter::plain(&format!(" - {}", name));
            OutputFormatter::plain(&format!("   → {}", planned.destination.display()));
        }
    }

    if !report.moved.is_empty() {
        OutputFormatter::summary_table(&report.category_counts(), report.moved.len());
    }

    if report.excluded > 0 {
        OutputFormatter::plain(&format!(
            "{} {} excluded by configuration",
            report.excluded,
            plural(report.excluded)
        ));
    }

    if !report.is_success() {
        OutputFormatter::warning(&format!(
            "Failed to move {} {}. See the log above for details.",
            report.failure_count(),
            plural(report.failure_count())
        ));
    } else if report.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else {
        OutputFormatter::success(&format!(
            "Done managing files in {}",
            config.root().display()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::file_organizer::Relocation;
    use clap::CommandFactory;
    use std::sync::{Arc, Mutex};

    /// Collects everything a test subscriber writes.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, log.contents())
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from(["dlsort", "/tmp/dl", "--dry-run", "-c", "my.toml"]).unwrap();
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp/dl")));
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert!(cli.dry_run);
        assert!(!cli.json);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["dlsort", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_overlapping_extensions_are_warned_about() {
        let config = Configuration::new("/dl");

        let (count, log) = capture_warnings(|| warn_about_overlaps(&config));

        assert_eq!(count, config.overlaps().len());
        assert_eq!(log.lines().count(), count);
        assert!(log.contains("WARN"));
        assert!(log.contains("extension '.csv' is listed under both document and datafile"));
        assert!(log.contains("extension '.flv' is listed under both audio and video"));
    }

    #[test]
    fn test_disjoint_tables_log_nothing() {
        let settings: Settings = toml::from_str(
            r#"
            [categories.audio]
            extensions = [".mp3"]
            [categories.video]
            extensions = [".mkv"]
            [categories.document]
            extensions = [".pdf"]
            [categories.datafile]
            extensions = [".zip"]
            "#,
        )
        .unwrap();
        let config = settings.build(Some(std::path::Path::new("/dl"))).unwrap();

        let (count, log) = capture_warnings(|| warn_about_overlaps(&config));

        assert_eq!(count, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_write_json_report() {
        let report = BatchReport {
            dry_run: true,
            moved: vec![Relocation {
                source: PathBuf::from("/dl/a.mp3"),
                destination: PathBuf::from("/dl/Audios/a.mp3"),
                category: Category::Audio,
            }],
            excluded: 2,
            ..Default::default()
        };
        let mut out = Vec::new();

        write_json(&report, &mut out).unwrap();

        assert_eq!(out.last(), Some(&b'\n'));
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["moved"][0]["destination"], "/dl/Audios/a.mp3");
        assert_eq!(json["moved"][0]["category"], "audio");
        assert_eq!(json["failure_count"], 0);
        assert_eq!(json["excluded"], 2);
    }

    #[test]
    fn test_default_log_level() {
        let mut cli = Cli::default();
        assert_eq!(cli.default_log_level(), "info");
        cli.verbose = true;
        assert_eq!(cli.default_log_level(), "debug");
        cli.verbose = false;
        cli.quiet = true;
        assert_eq!(cli.default_log_level(), "warn");
    }
}
