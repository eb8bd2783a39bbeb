//! WindowPartitioner: splits the marker axis into overlapping per-worker
//! windows (spec §4.3).

use crate::types::Marker;

/// A half-open marker range `[start, end)` assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Marker,
    pub end: Marker,
}

/// Smallest index `idx` with `gen_pos[idx] >= target` (clamped to
/// `gen_pos.len()`), the "standard binary-search upper lift" tie-break rule.
fn upper_lift(gen_pos: &[f64], target: f64) -> usize {
    gen_pos.partition_point(|&v| v < target)
}

/// Build `W' <= num_workers` overlapping windows covering `[0, M)`, such
/// that every candidate seed starting anywhere is fully contained in at
/// least one window.
pub fn partition_windows(
    gen_pos: &[f64],
    min_seed: f64,
    min_markers: usize,
    num_workers: usize,
) -> Vec<Window> {
    let m = gen_pos.len();
    if m == 0 {
        return Vec::new();
    }
    if num_workers <= 1 || m <= min_markers {
        return vec![Window { start: 0, end: m }];
    }

    let tot_len = gen_pos[m - 1] - gen_pos[0];
    let step = ((tot_len - min_seed) / num_workers as f64).max(1e-6);

    let mut windows = Vec::new();

    // Window 0.
    let mut end = upper_lift(gen_pos, gen_pos[0] + min_seed + step).min(m);
    end = end.max(min_markers).min(m);
    windows.push(Window { start: 0, end });

    while windows.last().unwrap().end < m {
        let end_prev = windows.last().unwrap().end;
        let new_start = find_new_start(gen_pos, end_prev, min_seed, min_markers);
        let target = gen_pos[end_prev - 1] + step;
        let mut new_end = upper_lift(gen_pos, target).min(m);
        new_end = new_end.max(new_start + min_markers).min(m);
        if new_end <= new_start {
            new_end = m;
        }
        windows.push(Window {
            start: new_start,
            end: new_end,
        });
    }

    // Last window's end is forced to M.
    windows.last_mut().unwrap().end = m;
    windows
}

/// Largest `start` such that the overlap back from `end_prev`'s last marker
/// is at least `min_seed` cM and `min_markers` markers.
fn find_new_start(gen_pos: &[f64], end_prev: usize, min_seed: f64, min_markers: usize) -> usize {
    let ok = |start: usize| -> bool {
        let cm_ok = gen_pos[end_prev - 1] - gen_pos[start - 1] >= min_seed;
        let markers_ok = end_prev as i64 - (start as i64 - 1) >= min_markers as i64;
        cm_ok && markers_ok
    };

    if end_prev < 2 {
        return 1;
    }

    let mut lo = 1usize;
    let mut hi = end_prev;
    if !ok(lo) {
        return lo;
    }
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if ok(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
