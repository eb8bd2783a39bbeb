//! PLINK genetic map parsing and cM interpolation.
//!
//! Genetic-position interpolation is explicitly out of the core engine's
//! scope (spec.md Non-goals) but is still required ambient plumbing to
//! produce the `genPos[]` array the core modules consume (SPEC_FULL.md §2).
//! Kept deliberately small and separately tested.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;
use anyhow::{bail, Context, Result};

use crate::parser::util::create_buffered_reader;

/// One chromosome's genetic map: positions and cM values, sorted by position.
#[derive(Debug, Clone, Default)]
pub struct ChromMap {
    pos: Vec<i64>,
    cm: Vec<f64>,
}

impl ChromMap {
    /// Linearly interpolate the genetic position of `pos`, extrapolating
    /// flatly past either end of the map.
    pub fn interpolate(&self, pos: i64) -> f64 {
        if self.pos.is_empty() {
            return 0.0;
        }
        if pos <= self.pos[0] {
            return self.cm[0];
        }
        if pos >= *self.pos.last().unwrap() {
            return *self.cm.last().unwrap();
        }
        // First index with pos[idx] >= pos (binary-search upper lift, §4.3).
        let idx = self.pos.partition_point(|&p| p < pos);
        if self.pos[idx] == pos {
            return self.cm[idx];
        }
        let (p0, c0) = (self.pos[idx - 1], self.cm[idx - 1]);
        let (p1, c1) = (self.pos[idx], self.cm[idx]);
        let frac = (pos - p0) as f64 / (p1 - p0) as f64;
        c0 + frac * (c1 - c0)
    }

    /// Interpolate genetic positions for a sorted slice of bp positions in a
    /// single streaming pass (avoids re-binary-searching per marker).
    pub fn interpolate_sorted(&self, positions: &[i64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(positions.len());
        let mut idx = 0usize;
        for &pos in positions {
            while idx < self.pos.len() && self.pos[idx] < pos {
                idx += 1;
            }
            out.push(self.interpolate_from(idx, pos));
        }
        out
    }

    fn interpolate_from(&self, idx: usize, pos: i64) -> f64 {
        if self.pos.is_empty() {
            return 0.0;
        }
        if idx == 0 {
            return self.cm[0];
        }
        if idx >= self.pos.len() {
            return *self.cm.last().unwrap();
        }
        if self.pos[idx] == pos {
            return self.cm[idx];
        }
        let (p0, c0) = (self.pos[idx - 1], self.cm[idx - 1]);
        let (p1, c1) = (self.pos[idx], self.cm[idx]);
        let frac = (pos - p0) as f64 / (p1 - p0) as f64;
        c0 + frac * (c1 - c0)
    }
}

/// A parsed PLINK-style genetic map, keyed by chromosome.
#[derive(Debug, Clone, Default)]
pub struct GeneticMap {
    by_chrom: AHashMap<String, ChromMap>,
}

impl GeneticMap {
    pub fn chrom(&self, chrom: &str) -> Option<&ChromMap> {
        self.by_chrom.get(chrom)
    }

    /// Parse a PLINK genetic map file (optionally gzipped). Accepts either
    /// the 3-column `chrom cM pos` form or the 4-column
    /// `chrom variant_id cM pos` form (columns whitespace-delimited).
    pub fn from_path(path: &Path) -> Result<GeneticMap> {
        let file = File::open(path).context("failed to open genetic map")?;
        let reader = create_buffered_reader(file, path);
        Self::from_reader(reader)
    }

    fn from_reader<R: BufRead>(reader: R) -> Result<GeneticMap> {
        let mut staged: HashMap<String, Vec<(i64, f64)>> = HashMap::new();

        for (lineno, line_result) in reader.lines().enumerate() {
            let line = line_result.context("failed to read genetic map line")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let (chrom, cm, pos) = match fields.len() {
                3 => (fields[0], fields[1], fields[2]),
                4 => (fields[0], fields[2], fields[3]),
                _ => bail!(
                    "genetic map line {} has {} fields, expected 3 or 4",
                    lineno + 1,
                    fields.len()
                ),
            };
            let cm: f64 = cm
                .parse()
                .with_context(|| format!("bad cM value on map line {}", lineno + 1))?;
            let pos: i64 = pos
                .parse()
                .with_context(|| format!("bad position on map line {}", lineno + 1))?;
            staged.entry(chrom.to_string()).or_default().push((pos, cm));
        }

        let mut by_chrom = AHashMap::default();
        for (chrom, mut rows) in staged {
            rows.sort_by_key(|&(pos, _)| pos);
            let mut pos = Vec::with_capacity(rows.len());
            let mut cm = Vec::with_capacity(rows.len());
            for (p, c) in rows {
                pos.push(p);
                cm.push(c);
            }
            by_chrom.insert(chrom, ChromMap { pos, cm });
        }

        Ok(GeneticMap { by_chrom })
    }
}
