mod commands;

use adl::cli::AutoLevel;
use adl::settings::{self, Settings};
use adl::{DownloadOutcome, Localizer};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL to download (a bare host is treated as https://)
    #[arg(index = 1)]
    url: Option<String>,

    /// Directory to save the file (defaults to the last used directory)
    #[arg(short = 'd', long = "download-dir")]
    download_dir: Option<PathBuf>,

    /// Number of connections; overrides the thread policy in settings
    #[arg(short = 's', long)]
    split: Option<usize>,

    /// Automatic thread policy level for this run
    #[arg(long = "auto-level", value_enum)]
    auto_level: Option<AutoLevel>,

    /// Language of status and error messages (e.g. en, pt_BR)
    #[arg(long)]
    lang: Option<String>,

    /// Directory with extra <code>.json language files
    #[arg(long = "lang-dir")]
    lang_dir: Option<PathBuf>,

    /// Timeout of the initial HEAD request, in seconds
    #[arg(long = "probe-timeout")]
    probe_timeout: Option<u64>,

    /// Connect/read timeout of data requests, in seconds
    #[arg(long = "data-timeout")]
    data_timeout: Option<u64>,

    /// Show one progress bar per connection
    #[arg(short = 'm', long)]
    monitor: bool,

    /// List completed downloads and exit
    #[arg(short = 'l', long)]
    list: bool,

    /// Remember the download directory and options of this run
    #[arg(long)]
    save: bool,

    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(Some(DownloadOutcome::Completed(_))) | Ok(None) => ExitCode::SUCCESS,
        Ok(Some(DownloadOutcome::Cancelled)) => ExitCode::from(130),
        Ok(Some(DownloadOutcome::Failed)) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Option<DownloadOutcome>> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list {
        commands::list_history()?;
        return Ok(None);
    }

    let Some(url) = args.url.clone() else {
        bail!("no URL given (see --help)");
    };

    let settings_path = settings::settings_path();
    let mut settings = Settings::load(&settings_path);
    if let Some(level) = args.auto_level {
        settings.auto_level = level;
    }
    if let Some(lang) = &args.lang {
        settings.language = lang.clone();
    }
    if let Some(secs) = args.probe_timeout {
        settings.probe_timeout_secs = secs;
    }
    if let Some(secs) = args.data_timeout {
        settings.data_timeout_secs = secs;
    }

    let mut download_dir = args
        .download_dir
        .clone()
        .or_else(|| settings.last_path.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    if download_dir.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            download_dir = cwd.join(&download_dir);
        }
    }

    if args.save {
        settings.last_path = Some(download_dir.clone());
        settings.save(&settings_path)?;
    }

    let mut strings = Localizer::new(&settings.language);
    if let Some(dir) = &args.lang_dir {
        strings.load_dir(dir)?;
        strings.set_language(&settings.language);
    }

    let threads = args
        .split
        .unwrap_or_else(|| settings.thread_count(num_cpus::get()))
        .max(1);
    tracing::debug!(threads, dir = ?download_dir, "starting download");

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(commands::run_download(
        url,
        download_dir,
        threads,
        settings.engine_config(),
        strings,
        args.monitor,
    ))?;
    Ok(Some(outcome))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "adl=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}
