//! Dispatch & Queueing: one worker per window, bounded seed queue, two-phase
//! producer/consumer lifecycle (spec §4.6).

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::Config;
use crate::error::{HapIbdError, Result};
use crate::extend;
use crate::output::{LineBuffer, OutputSink};
use crate::panel::GenotypePanel;
use crate::seed::scan_window;
use crate::types::{Chromosome, SegmentKind, SeedRecord};
use crate::window::Window;

/// Local seed buffer is flushed (or handed to the queue) once it holds this
/// many seed records.
const SEED_LIST_THRESHOLD: usize = 5000;

/// Consumer-phase queue poll timeout.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Seed queue bound, in batches.
const QUEUE_CAPACITY: usize = 64;

/// How often (in markers) a worker re-checks whether the consumer phase has
/// started, rather than on every marker (spec §4.6: "every few markers").
const MARKER_CHECK_INTERVAL: usize = 64;

/// Process-wide segment counters (spec §9: cross-process value not part of
/// the output contract, only used for `.log` diagnostics).
#[derive(Default)]
pub struct Metrics {
    pub n_hbd_segs: AtomicU64,
    pub n_ibd_segs: AtomicU64,
}

/// The two output sinks a worker writes extended segments to.
pub struct Sinks<'a> {
    pub ibd: &'a dyn OutputSink,
    pub hbd: &'a dyn OutputSink,
}

/// Scan every window, extend and write every surviving seed, and return the
/// accumulated segment counts. One OS thread per window (spec §5).
pub fn run(
    panel: &GenotypePanel,
    cfg: &Config,
    chrom: &Chromosome,
    windows: &[Window],
    sinks: &Sinks,
) -> Result<Metrics> {
    let metrics = Metrics::default();
    let finished_count = AtomicUsize::new(0);
    let n_workers = windows.len();
    let (tx, rx) = bounded::<Vec<i64>>(QUEUE_CAPACITY);

    let outcome: std::result::Result<(), HapIbdError> = std::thread::scope(|scope| {
        let handles: Vec<_> = windows
            .iter()
            .map(|&window| {
                let tx = tx.clone();
                let rx = rx.clone();
                let finished_count = &finished_count;
                let metrics = &metrics;
                scope.spawn(move || {
                    worker_loop(
                        panel,
                        cfg,
                        chrom,
                        window,
                        n_workers,
                        tx,
                        rx,
                        finished_count,
                        metrics,
                        sinks,
                    )
                })
            })
            .collect();
        drop(tx);
        drop(rx);

        let mut first_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if first_err.is_none() => first_err = Some(e),
                Err(_) if first_err.is_none() => {
                    first_err = Some(HapIbdError::Worker("worker thread panicked".to_string()))
                }
                _ => {}
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });
    outcome?;
    Ok(metrics)
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    panel: &GenotypePanel,
    cfg: &Config,
    chrom: &Chromosome,
    window: Window,
    n_workers: usize,
    tx: Sender<Vec<i64>>,
    rx: Receiver<Vec<i64>>,
    finished_count: &AtomicUsize,
    metrics: &Metrics,
    sinks: &Sinks,
) -> Result<()> {
    let mut local: Vec<i64> = Vec::new();
    // Interior mutability lets `on_seed` (which reads the flag to decide how
    // to dispatch a full batch) and `on_marker` (which flips it) coexist as
    // separate closures borrowed concurrently by the same `scan_window` call.
    let use_seed_q = Cell::new(false);
    let marker_count = Cell::new(0usize);
    let mut ibd_buf = LineBuffer::default();
    let mut hbd_buf = LineBuffer::default();
    let mut worker_err: Option<HapIbdError> = None;

    {
        let mut on_seed = |seed: SeedRecord| {
            if worker_err.is_some() {
                return;
            }
            local.extend_from_slice(&seed.to_ints());
            if local.len() / 4 >= SEED_LIST_THRESHOLD {
                let batch = std::mem::take(&mut local);
                if let Err(e) = dispatch_batch(
                    batch, &tx, use_seed_q.get(), panel, cfg, chrom, &mut ibd_buf, &mut hbd_buf,
                    sinks, metrics,
                ) {
                    worker_err = Some(e);
                }
            }
        };
        // Periodic check: once any worker has entered its consumer phase,
        // start offering batches to the shared queue instead of always
        // self-processing (spec §4.6 "every few markers").
        let on_marker = || {
            if use_seed_q.get() {
                return;
            }
            let n = marker_count.get() + 1;
            marker_count.set(n);
            if n % MARKER_CHECK_INTERVAL == 0 && finished_count.load(Ordering::Acquire) > 0 {
                use_seed_q.set(true);
            }
        };
        scan_window(panel, window, cfg.min_seed, cfg.min_markers, &mut on_seed, on_marker);
    }
    if let Some(e) = worker_err {
        return Err(e);
    }

    if !local.is_empty() {
        let batch = std::mem::take(&mut local);
        dispatch_batch(
            batch, &tx, use_seed_q.get(), panel, cfg, chrom, &mut ibd_buf, &mut hbd_buf, sinks,
            metrics,
        )?;
    }

    finished_count.fetch_add(1, Ordering::AcqRel);
    drop(tx);

    loop {
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(batch) => process_batch(&batch, panel, cfg, chrom, &mut ibd_buf, &mut hbd_buf, sinks, metrics)?,
            Err(RecvTimeoutError::Timeout) => {
                if finished_count.load(Ordering::Acquire) >= n_workers && rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    ibd_buf.flush_to(sinks.ibd)?;
    hbd_buf.flush_to(sinks.hbd)?;
    Ok(())
}

/// Hand a full batch to the queue once the consumer phase has started;
/// otherwise (or on a full/disconnected queue) process it locally.
#[allow(clippy::too_many_arguments)]
fn dispatch_batch(
    batch: Vec<i64>,
    tx: &Sender<Vec<i64>>,
    use_seed_q: bool,
    panel: &GenotypePanel,
    cfg: &Config,
    chrom: &Chromosome,
    ibd_buf: &mut LineBuffer,
    hbd_buf: &mut LineBuffer,
    sinks: &Sinks,
    metrics: &Metrics,
) -> Result<()> {
    if use_seed_q {
        match tx.try_send(batch) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(batch)) | Err(TrySendError::Disconnected(batch)) => {
                process_batch(&batch, panel, cfg, chrom, ibd_buf, hbd_buf, sinks, metrics)?;
            }
        }
    } else {
        process_batch(&batch, panel, cfg, chrom, ibd_buf, hbd_buf, sinks, metrics)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_batch(
    batch: &[i64],
    panel: &GenotypePanel,
    cfg: &Config,
    chrom: &Chromosome,
    ibd_buf: &mut LineBuffer,
    hbd_buf: &mut LineBuffer,
    sinks: &Sinks,
    metrics: &Metrics,
) -> Result<()> {
    for chunk in batch.chunks_exact(4) {
        let seed = SeedRecord::from_ints(chunk);
        let Some(seg) = extend::extend(panel, cfg, seed) else {
            continue;
        };
        let line = crate::output::format_line(&seg, chrom);
        match seg.kind {
            SegmentKind::Ibd => {
                metrics.n_ibd_segs.fetch_add(1, Ordering::Relaxed);
                ibd_buf.push(&line);
                if ibd_buf.should_flush() {
                    ibd_buf.flush_to(sinks.ibd)?;
                }
            }
            SegmentKind::Hbd => {
                metrics.n_hbd_segs.fetch_add(1, Ordering::Relaxed);
                hbd_buf.push(&line);
                if hbd_buf.should_flush() {
                    hbd_buf.flush_to(sinks.hbd)?;
                }
            }
        }
    }
    Ok(())
}
