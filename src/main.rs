use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use tubezip::{
    Bitrate, BundlingMode, NoopReporter, OutcomeRecord, OutcomeStatus, ProgressEvent,
    ProgressReporter, RunError, RunOptions, RunReport, RunRequest, SharedProgressReporter,
    StopSignal, YtDlpAdapter, convert, format_megabytes, parse_url_lines, read_url_file,
    write_report,
};

// Emoji with fallback for terminals without Unicode support
static MUSIC: Emoji<'_, '_> = Emoji("🎵 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static LIST: Emoji<'_, '_> = Emoji("📃 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "[z] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Everything in one archive
    Combined,
    /// One archive per playlist plus one for loose videos
    PerPlaylist,
}

impl From<Mode> for BundlingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Combined => BundlingMode::Combined,
            Mode::PerPlaylist => BundlingMode::PerPlaylist,
        }
    }
}

/// Convert video and playlist URLs into tagged MP3 files bundled as ZIP archives
#[derive(Parser, Debug)]
#[command(name = "tubezip")]
#[command(about = "Convert video and playlist URLs into MP3 files bundled as ZIP archives")]
#[command(version)]
struct Args {
    /// Video URLs
    urls: Vec<String>,

    /// File with one video URL per line ("-" reads stdin)
    #[arg(short, long)]
    input_file: Option<PathBuf>,

    /// Playlist URL (repeatable)
    #[arg(short, long = "playlist")]
    playlists: Vec<String>,

    /// File with one playlist URL per line
    #[arg(long)]
    playlist_file: Option<PathBuf>,

    /// MP3 bitrate in kbps (96, 128, 160, 192, 256, 320)
    #[arg(short, long, default_value = "320")]
    bitrate: Bitrate,

    /// Do not embed the video thumbnail as cover art
    #[arg(long)]
    no_thumbnail: bool,

    /// Directory holding produced MP3 files during the run
    #[arg(short, long, default_value = tubezip::config::DEFAULT_WORKSPACE)]
    workspace: PathBuf,

    /// How files are grouped into archives
    #[arg(short, long, value_enum, default_value = "combined")]
    mode: Mode,

    /// Maximum videos taken from each playlist (0 = all)
    #[arg(long, default_value = "0")]
    playlist_cap: usize,

    /// Maximum seconds spent listing one playlist
    #[arg(long, default_value = "120")]
    playlist_timeout: u64,

    /// Name of the combined archive
    #[arg(short = 'z', long)]
    zip_name: Option<String>,

    /// Path of the ffmpeg binary or its directory
    #[arg(long)]
    ffmpeg_location: Option<PathBuf>,

    /// Path of the yt-dlp binary (looked up on PATH by default)
    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,

    /// Directory the archives are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Maximum seconds spent on one video
    #[arg(long, default_value = "900")]
    item_timeout: u64,

    /// Retries for network failures and timeouts
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            bitrate: self.bitrate,
            embed_thumbnail: !self.no_thumbnail,
            workspace: self.workspace.clone(),
            bundling_mode: self.mode.into(),
            playlist_cap: self.playlist_cap,
            listing_timeout: Duration::from_secs(self.playlist_timeout),
            combined_archive_name: self
                .zip_name
                .clone()
                .unwrap_or(defaults.combined_archive_name),
            archive_timestamp: defaults.archive_timestamp,
            item_timeout: Duration::from_secs(self.item_timeout),
            retries: self.retries,
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    batch_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            batch_bar: Mutex::new(None),
        }
    }

    fn start_batch(&self, total: usize) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{pos}}/{{len}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(style);
        *self.batch_bar.lock().unwrap() = Some(bar);
    }

    fn with_batch_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.batch_bar.lock().unwrap().as_ref() {
            f(bar);
        }
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ResolvingPlaylist { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Resolving playlist: {}", url.cyan()));
            }

            ProgressEvent::PlaylistResolved { title, videos } => {
                self.println(format!(
                    "{LIST}{} • {} videos enqueued",
                    title.bold().green(),
                    videos.to_string().cyan()
                ));
            }

            ProgressEvent::PlaylistFailed { url, error } => {
                self.println(format!("{WARNING}{} - {}", url.yellow(), error.dimmed()));
            }

            ProgressEvent::BatchStarting { total } => {
                self.main_bar.set_message(format!(
                    "{MUSIC}Converting {} videos",
                    total.to_string().cyan()
                ));
                self.start_batch(total);
            }

            ProgressEvent::ItemStarting { index, total, url } => {
                self.with_batch_bar(|bar| {
                    bar.set_message(format!(
                        "[{}/{}] {}",
                        (index + 1).to_string().cyan(),
                        total.to_string().cyan(),
                        truncate_title(&url, 50)
                    ));
                });
            }

            ProgressEvent::ItemRetrying {
                index,
                attempt,
                error,
            } => {
                self.with_batch_bar(|bar| {
                    bar.set_message(format!(
                        "[{}] retry {} after: {}",
                        (index + 1).to_string().cyan(),
                        attempt.to_string().yellow(),
                        truncate_title(&error, 40).dimmed()
                    ));
                });
            }

            ProgressEvent::ItemFinished { outcome, .. } => {
                self.println(format_row(&outcome));
                self.with_batch_bar(|bar| bar.inc(1));
            }

            ProgressEvent::BatchCompleted {
                succeeded,
                failed,
                stopped,
            } => {
                self.with_batch_bar(|bar| bar.finish_and_clear());
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} converted, {} failed{}",
                    "Batch complete:".bold().green(),
                    succeeded.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    },
                    if stopped {
                        " (stopped early)".yellow().to_string()
                    } else {
                        String::new()
                    }
                );
            }

            ProgressEvent::ArchiveReady { name, files, bytes } => {
                println!(
                    "{PACKAGE}{} • {} files, {}",
                    name.bold(),
                    files.to_string().cyan(),
                    format_megabytes(bytes)
                );
            }

            ProgressEvent::WorkspacePurged { removed, failed } => {
                if failed > 0 {
                    println!(
                        "{WARNING}Workspace cleanup left {} entries ({} removed)",
                        failed.to_string().yellow(),
                        removed
                    );
                }
            }
        }
    }
}

fn format_row(outcome: &OutcomeRecord) -> String {
    let row = outcome.table_row();
    match row.status {
        OutcomeStatus::Success => format!(
            "  {SUCCESS}{:>3}. {} {} {}",
            row.number,
            truncate_title(&row.title, 40).green(),
            row.size.dimmed(),
            row.file_name.dimmed()
        ),
        OutcomeStatus::Failed => format!(
            "  {FAILURE}{:>3}. {} {}",
            row.number,
            truncate_title(&outcome.work_item.source_url, 40).red(),
            row.file_name.dimmed()
        ),
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Merge inline URLs with the lines of an optional file
fn collect_urls(inline: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut lines = inline.to_vec();

    if let Some(path) = file {
        if path == Path::new("-") {
            let text = std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?;
            lines.extend(parse_url_lines(&text));
        } else {
            let urls = read_url_file(path)
                .with_context(|| format!("Failed to read URL file {}", path.display()))?;
            lines.extend(urls);
        }
    }

    Ok(parse_url_lines(&lines.join("\n")))
}

fn print_failures(outcomes: &[OutcomeRecord]) {
    let failures: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", "Failed videos:".red().bold());
    for outcome in failures {
        println!(
            "  {}{} - {}",
            CROSS,
            outcome.work_item.source_url.yellow(),
            outcome.error_reason.as_deref().unwrap_or("unknown error").dimmed()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MUSIC,
            "tubezip".bold().magenta(),
            "- Video to MP3 Bundler".dimmed()
        );
    }

    let video_urls = collect_urls(&args.urls, args.input_file.as_deref())?;
    let playlist_urls = collect_urls(&args.playlists, args.playlist_file.as_deref())?;
    if video_urls.is_empty() && playlist_urls.is_empty() {
        bail!("No URLs given");
    }

    let mut adapter = match &args.yt_dlp {
        Some(path) => YtDlpAdapter::new(path),
        None => YtDlpAdapter::from_path().context("Failed to locate yt-dlp")?,
    };
    if let Some(location) = &args.ffmpeg_location {
        adapter = adapter.with_ffmpeg_location(location);
    }

    let request = RunRequest {
        video_urls,
        playlist_urls,
        options: args.run_options(),
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let stop = StopSignal::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current video");
            signal.stop();
        }
    });

    let started_at = Utc::now();
    let conversion = match convert(&adapter, &request, &reporter, &stop).await {
        Ok(conversion) => conversion,
        Err(RunError::Packaging { source, outcomes }) => {
            print_failures(&outcomes);
            return Err(source).context("Failed to package archives");
        }
        Err(e) => return Err(e).context("Conversion failed"),
    };

    if !args.quiet {
        print_failures(&conversion.outcomes);
    }

    let report = args
        .report
        .as_ref()
        .map(|_| RunReport::from_conversion(&conversion, &request.options, started_at));
    let succeeded = conversion.succeeded();

    let delivery = conversion
        .deliver_to(&args.output_dir, &reporter)
        .context("Failed to deliver archives")?;

    if let (Some(report), Some(path)) = (report, &args.report) {
        write_report(&report, path).context("Failed to write run report")?;
    }

    if !args.quiet {
        for path in &delivery.paths {
            println!("\n{FOLDER}Archive: {}", path.display().to_string().cyan());
        }
        println!();
    }

    if succeeded == 0 {
        std::process::exit(1);
    }

    Ok(())
}
