//! CLI entry point for hapibd.
//!
//! Translates the external `key=value` argument contract into clap's long
//! flags, validates into a [`Config`], then drives a single-chromosome
//! PBWT IBD/HBD run: load panel and genetic map, partition windows, dispatch
//! one worker thread per window, and finalize the two gzip output sinks.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};

use hapibd::config::{Args, Config};
use hapibd::dispatch::{self, Sinks};
use hapibd::error::HapIbdError;
use hapibd::genmap::GeneticMap;
use hapibd::keyvalue;
use hapibd::output::FileSink;
use hapibd::panel::GenotypePanel;

fn main() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    let args = match parse_args(&raw_args) {
        Ok(a) => a,
        Err(e) => return report_before_logging(&e),
    };
    let cfg = match Config::from_args(args) {
        Ok(c) => c,
        Err(e) => return report_before_logging(&e),
    };

    if let Err(e) = FanoutLogger::install(&log_file_path(&cfg.out)) {
        return report_before_logging(&HapIbdError::Io(e));
    }

    match run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Translate `key=value` tokens (spec §6) into clap long flags and parse.
fn parse_args(raw_args: &[String]) -> Result<Args, HapIbdError> {
    let translated = keyvalue::translate(raw_args)?;
    let argv = std::iter::once("hapibd".to_string()).chain(translated);
    Args::try_parse_from(argv).map_err(|e| HapIbdError::Config(e.to_string()))
}

fn run(cfg: &Config) -> Result<(), HapIbdError> {
    let start = Instant::now();

    let excluded = load_excluded_samples(cfg.excludesamples.as_deref())?;

    info!("loading genetic map from {}", cfg.map.display());
    let genmap = GeneticMap::from_path(&cfg.map)
        .map_err(|e| HapIbdError::Input(format!("failed to load genetic map: {e:#}")))?;

    info!("loading genotype panel from {}", cfg.gt.display());
    let panel = GenotypePanel::build(&cfg.gt, &genmap, &excluded, cfg.min_mac)
        .map_err(|e| HapIbdError::Input(format!("failed to load genotype panel: {e:#}")))?;
    info!(
        "loaded {} samples ({} haplotypes), {} markers passed min-mac, chromosome {}",
        panel.n_samples(),
        panel.n_haplotypes(),
        panel.n_markers(),
        panel.chrom()
    );

    let windows = hapibd::window::partition_windows(
        panel.gen_pos_all(),
        cfg.min_seed,
        cfg.min_markers,
        cfg.nthreads,
    );
    info!(
        "partitioned into {} window(s) ({} thread(s) requested)",
        windows.len(),
        cfg.nthreads
    );

    let ibd_path = with_suffix(&cfg.out, "ibd.gz");
    let hbd_path = with_suffix(&cfg.out, "hbd.gz");
    let ibd_sink = FileSink::create(&ibd_path)?;
    let hbd_sink = FileSink::create(&hbd_path)?;
    let sinks = Sinks {
        ibd: &ibd_sink,
        hbd: &hbd_sink,
    };

    let metrics = dispatch::run(&panel, cfg, panel.chrom(), &windows, &sinks)?;

    ibd_sink.finalize()?;
    hbd_sink.finalize()?;

    info!(
        "wrote {} IBD and {} HBD segment(s) in {:.2}s",
        metrics.n_ibd_segs.load(Ordering::Relaxed),
        metrics.n_hbd_segs.load(Ordering::Relaxed),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn with_suffix(out: &Path, suffix: &str) -> PathBuf {
    let mut s = out.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

fn log_file_path(out: &Path) -> PathBuf {
    with_suffix(out, "log")
}

fn load_excluded_samples(path: Option<&Path>) -> Result<HashSet<String>, HapIbdError> {
    let Some(path) = path else {
        return Ok(HashSet::new());
    };
    let file = File::open(path).map_err(HapIbdError::Io)?;
    let mut out = HashSet::new();
    for line in io::BufReader::new(file).lines() {
        let line = line.map_err(HapIbdError::Io)?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.insert(trimmed.to_string());
        }
    }
    Ok(out)
}

fn exit_code_for(err: &HapIbdError) -> u8 {
    match err {
        HapIbdError::Config(_) => 2,
        HapIbdError::Input(_) => 3,
        HapIbdError::Io(_) => 4,
        HapIbdError::Worker(_) => 5,
    }
}

/// Reported before the `.log` file exists (bad arguments or config): print
/// to stderr, plus clap's usage string for `ConfigError`.
fn report_before_logging(err: &HapIbdError) -> ExitCode {
    eprintln!("hapibd: error: {err}");
    if matches!(err, HapIbdError::Config(_)) {
        eprintln!("{}", Args::command().render_usage());
    }
    ExitCode::from(exit_code_for(err))
}

/// A [`log::Log`] that fans every record out to both stderr and `<out>.log`,
/// since `env_logger` alone only targets one stream (spec §6's ".log" file).
struct FanoutLogger {
    file: Mutex<File>,
}

static LOGGER: OnceLock<FanoutLogger> = OnceLock::new();

impl FanoutLogger {
    fn install(path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let logger = LOGGER.get_or_init(|| FanoutLogger {
            file: Mutex::new(file),
        });
        log::set_logger(logger)
            .map(|()| log::set_max_level(LevelFilter::Info))
            .ok();
        Ok(())
    }
}

impl log::Log for FanoutLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{} {}] {}\n",
            record.level(),
            record.target(),
            record.args()
        );
        eprint!("{line}");
        if let Ok(mut f) = self.file.lock() {
            let _ = f.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        if let Ok(mut f) = self.file.lock() {
            let _ = f.flush();
        }
    }
}
