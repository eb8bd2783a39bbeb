//! PBWT sort state and the one-marker-at-a-time forward update (spec §4.2).

use crate::types::{Haplotype, Marker};

/// Mutable PBWT sort state: the permutation array `a[]` and divergence
/// array `d[]` over haplotype indices (spec §3).
pub struct PbwtState {
    a: Vec<Haplotype>,
    d: Vec<Marker>,
    // Scratch, reused across calls to avoid per-update allocation (spec §9).
    buckets: Vec<Vec<Haplotype>>,
    div_buckets: Vec<Vec<Marker>>,
    p: Vec<Marker>,
}

impl PbwtState {
    /// Construct the identity state for a window starting at `window_start`:
    /// `a[k] = k`, `d[k] = window_start`.
    pub fn new(window_start: Marker, n_haplotypes: usize) -> PbwtState {
        PbwtState {
            a: (0..n_haplotypes).collect(),
            d: vec![window_start; n_haplotypes],
            buckets: Vec::new(),
            div_buckets: Vec::new(),
            p: Vec::new(),
        }
    }

    pub fn a(&self) -> &[Haplotype] {
        &self.a
    }

    pub fn d(&self) -> &[Marker] {
        &self.d
    }

    pub fn n_haplotypes(&self) -> usize {
        self.a.len()
    }

    fn ensure_scratch(&mut self, n_alleles: usize, n_haps: usize) {
        while self.buckets.len() < n_alleles {
            self.buckets.push(Vec::with_capacity(n_haps));
            self.div_buckets.push(Vec::with_capacity(n_haps));
        }
        for v in 0..n_alleles {
            self.buckets[v].clear();
            self.div_buckets[v].clear();
        }
        if self.p.len() < n_alleles {
            self.p.resize(n_alleles, 0);
        }
    }

    /// Advance the PBWT by one marker. `allele_at(h)` is a lazy row view
    /// (spec §9: "no need to materialize a vector").
    pub fn fwd_update(&mut self, m: Marker, n_alleles: usize, allele_at: impl Fn(Haplotype) -> u8) {
        let n_haps = self.a.len();
        self.ensure_scratch(n_alleles, n_haps);

        for v in 0..n_alleles {
            self.p[v] = m + 1;
        }

        for k in 0..n_haps {
            let h = self.a[k];
            let div_update = self.d[k];
            for v in 0..n_alleles {
                if div_update > self.p[v] {
                    self.p[v] = div_update;
                }
            }
            let al = allele_at(h) as usize;
            self.buckets[al].push(h);
            self.div_buckets[al].push(self.p[al]);
            self.p[al] = 0;
        }

        let mut idx = 0;
        for v in 0..n_alleles {
            let len = self.buckets[v].len();
            self.a[idx..idx + len].copy_from_slice(&self.buckets[v]);
            self.d[idx..idx + len].copy_from_slice(&self.div_buckets[v]);
            idx += len;
        }
    }
}
