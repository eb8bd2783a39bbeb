//! SeedExtender: gap-jump extension, output filtering, and cM formatting
//! (spec §4.5).

use crate::config::Config;
use crate::panel::GenotypePanel;
use crate::types::{Haplotype, Marker, OutputSegment, SeedRecord};

/// Extend a seed to a fixed point in both directions and, if it survives
/// the `min-output` filter, turn it into an output segment. Returns `None`
/// both for "filtered out" and for "duplicate of an earlier seed" (the
/// `extendStart` discard rule) — the caller cannot distinguish the two,
/// matching the source's "drop the seed" semantics.
pub fn extend(panel: &GenotypePanel, cfg: &Config, seed: SeedRecord) -> Option<OutputSegment> {
    let h1 = seed.hap1;
    let h2 = seed.hap2;

    let e = extend_incl_end(panel, cfg, h1, h2, seed.ibs_incl_end);
    let s = extend_start(panel, cfg, h1, h2, seed.ibs_start)?;

    let cm = panel.gen_pos(e) - panel.gen_pos(s);
    if cm < cfg.min_output {
        return None;
    }

    Some(OutputSegment::from_haplotypes(
        h1,
        h2,
        panel.pos(s),
        panel.pos(e),
        round3(cm),
    ))
}

/// Round half-up to 3 fractional digits.
pub fn round3(x: f64) -> f64 {
    ((x * 1000.0) + 0.5).floor() / 1000.0
}

fn extend_incl_end(panel: &GenotypePanel, cfg: &Config, h1: Haplotype, h2: Haplotype, mut e: Marker) -> Marker {
    let m_last = panel.n_markers() - 1;
    loop {
        while e < m_last && panel.allele(e + 1, h1) == panel.allele(e + 1, h2) {
            e += 1;
        }
        if cfg.max_gap < 0 || e == m_last {
            break;
        }
        match gap_jump_forward(panel, cfg, h1, h2, e, m_last) {
            Some(new_e) => e = new_e,
            None => break,
        }
    }
    e
}

/// One gap-jump attempt at the right end. Returns the new `e` if the
/// trailing match-run inside the gap window meets the extend thresholds.
fn gap_jump_forward(
    panel: &GenotypePanel,
    cfg: &Config,
    h1: Haplotype,
    h2: Haplotype,
    e: Marker,
    m_last: Marker,
) -> Option<Marker> {
    let m = e + 1;
    let mut last_mism = m;
    let mut mp = m + 1;
    while mp <= m_last && panel.pos(mp) - panel.pos(m) <= cfg.max_gap {
        if panel.allele(mp, h1) != panel.allele(mp, h2) {
            last_mism = mp;
        }
        mp += 1;
    }
    let run_start = last_mism + 1;
    let run_end_incl = mp - 1;
    if run_start > run_end_incl {
        return None;
    }
    if run_meets_extend_criteria(panel, cfg, run_start, run_end_incl) {
        Some(run_end_incl)
    } else {
        None
    }
}

enum LeftGapJump {
    Extend(Marker),
    Drop,
    NoChange,
}

fn extend_start(panel: &GenotypePanel, cfg: &Config, h1: Haplotype, h2: Haplotype, mut s: Marker) -> Option<Marker> {
    loop {
        while s > 0 && panel.allele(s - 1, h1) == panel.allele(s - 1, h2) {
            s -= 1;
        }
        if cfg.max_gap < 0 || s == 0 {
            break;
        }
        match gap_jump_backward(panel, cfg, h1, h2, s) {
            LeftGapJump::Extend(new_s) => s = new_s,
            LeftGapJump::Drop => return None,
            LeftGapJump::NoChange => break,
        }
    }
    Some(s)
}

/// One gap-jump attempt at the left end. Distinguishes a plain extension
/// from the duplicate-discard case: if the discovered run alone already
/// meets the full seed criteria, this seed is a duplicate of one that will
/// be independently emitted starting there.
fn gap_jump_backward(panel: &GenotypePanel, cfg: &Config, h1: Haplotype, h2: Haplotype, s: Marker) -> LeftGapJump {
    let m = s - 1;
    let mut last_mism = m;
    let mut mp: i64 = m as i64 - 1;
    while mp >= 0 && panel.pos(m) - panel.pos(mp as usize) <= cfg.max_gap {
        let mpu = mp as usize;
        if panel.allele(mpu, h1) != panel.allele(mpu, h2) {
            last_mism = mpu;
        }
        mp -= 1;
    }
    let run_start = (mp + 1) as usize;
    if last_mism == 0 {
        return LeftGapJump::NoChange;
    }
    let run_end_incl = last_mism - 1;
    if run_start > run_end_incl {
        return LeftGapJump::NoChange;
    }
    if run_meets_seed_criteria(panel, cfg, run_start, run_end_incl) {
        LeftGapJump::Drop
    } else if run_meets_extend_criteria(panel, cfg, run_start, run_end_incl) {
        LeftGapJump::Extend(run_start)
    } else {
        LeftGapJump::NoChange
    }
}

fn run_meets_extend_criteria(panel: &GenotypePanel, cfg: &Config, start: Marker, end_incl: Marker) -> bool {
    let cm_len = panel.gen_pos(end_incl) - panel.gen_pos(start);
    let marker_len = (end_incl - start + 1) as i64;
    cm_len >= cfg.min_extend && marker_len >= cfg.min_extend_markers()
}

fn run_meets_seed_criteria(panel: &GenotypePanel, cfg: &Config, start: Marker, end_incl: Marker) -> bool {
    let cm_len = panel.gen_pos(end_incl) - panel.gen_pos(start);
    let marker_len = (end_incl - start + 1) as i64;
    cm_len >= cfg.min_seed && marker_len >= cfg.min_markers as i64
}
