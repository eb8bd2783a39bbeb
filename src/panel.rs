//! GenotypePanel: read-only random access to one chromosome's phased
//! genotype matrix (spec §4.1).

use std::collections::HashSet;
use std::path::Path;

use ahash::AHashSet;
use anyhow::{bail, Context, Result};

use crate::genmap::GeneticMap;
use crate::parser::vcf::VcfReader;
use crate::types::{Chromosome, Haplotype, Marker};

/// Immutable (markers × haplotypes) panel for one chromosome.
pub struct GenotypePanel {
    chrom: Chromosome,
    n_haplotypes: usize,
    pos: Vec<i64>,
    gen_pos: Vec<f64>,
    n_alleles: Vec<u8>,
    /// Row-major, `alleles[m * n_haplotypes + h]`.
    alleles: Vec<u8>,
    is_diploid: Vec<bool>,
    sample_ids: Vec<String>,
}

impl GenotypePanel {
    #[inline]
    pub fn allele(&self, m: Marker, h: Haplotype) -> u8 {
        self.alleles[m * self.n_haplotypes + h]
    }

    #[inline]
    pub fn pos(&self, m: Marker) -> i64 {
        self.pos[m]
    }

    #[inline]
    pub fn gen_pos(&self, m: Marker) -> f64 {
        self.gen_pos[m]
    }

    /// All markers' genetic positions, in marker order (used by the window
    /// partitioner, which needs the whole axis up front).
    pub fn gen_pos_all(&self) -> &[f64] {
        &self.gen_pos
    }

    #[inline]
    pub fn n_alleles(&self, m: Marker) -> usize {
        self.n_alleles[m] as usize
    }

    #[inline]
    pub fn is_diploid(&self, sample: usize) -> bool {
        self.is_diploid[sample]
    }

    pub fn sample_id(&self, sample: usize) -> &str {
        &self.sample_ids[sample]
    }

    pub fn n_markers(&self) -> usize {
        self.pos.len()
    }

    pub fn n_haplotypes(&self) -> usize {
        self.n_haplotypes
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn chrom(&self) -> &Chromosome {
        &self.chrom
    }

    /// Load, from a phased genotype stream, the panel for a single
    /// chromosome: markers are kept only if their minor allele count (the
    /// count of the second-most-frequent allele, across all haplotypes) is
    /// `>= min_mac` (spec §4.1).
    pub fn build(
        path: &Path,
        genmap: &GeneticMap,
        excluded_samples: &HashSet<String>,
        min_mac: u32,
    ) -> Result<GenotypePanel> {
        let excluded: AHashSet<String> = excluded_samples.iter().cloned().collect();
        let mut reader = VcfReader::new(path, &excluded)?;

        let n_haplotypes = reader.n_samples() * 2;
        let mut chrom: Option<String> = None;
        let mut pos = Vec::new();
        let mut n_alleles = Vec::new();
        let mut alleles: Vec<u8> = Vec::new();
        let mut last_pos = i64::MIN;

        while let Some(rec) = reader.next_record()? {
            match &chrom {
                None => chrom = Some(rec.chrom.clone()),
                Some(c) if *c != rec.chrom => {
                    bail!("genotype file contains more than one chromosome ('{c}' and '{}'); one chromosome per panel build", rec.chrom)
                }
                _ => {}
            }
            if rec.pos <= last_pos {
                bail!(
                    "marker positions must be strictly increasing, got {} after {}",
                    rec.pos,
                    last_pos
                );
            }
            last_pos = rec.pos;

            let mac = minor_allele_count(&rec.alleles, rec.n_alleles);
            if mac < min_mac {
                continue;
            }

            pos.push(rec.pos);
            n_alleles.push(
                u8::try_from(rec.n_alleles)
                    .context("marker has more than 255 alleles, unsupported")?,
            );
            alleles.extend_from_slice(&rec.alleles);
        }

        let Some(chrom) = chrom else {
            bail!("genotype file contained no records");
        };

        let gen_pos = {
            let chrom_map = genmap
                .chrom(&chrom)
                .with_context(|| format!("chromosome '{chrom}' not present in genetic map"))?;
            chrom_map.interpolate_sorted(&pos)
        };

        if pos.is_empty() {
            bail!("no markers passed the min-mac filter; nothing to scan");
        }

        Ok(GenotypePanel {
            chrom: Chromosome::from(chrom),
            n_haplotypes,
            pos,
            gen_pos,
            n_alleles,
            alleles,
            is_diploid: reader.is_diploid,
            sample_ids: reader.sample_ids,
        })
    }
}

/// MAC = count of the second-most-frequent allele across all haplotypes.
fn minor_allele_count(alleles: &[u8], n_alleles: usize) -> u32 {
    let mut counts = vec![0u32; n_alleles];
    for &a in alleles {
        counts[a as usize] += 1;
    }
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts.get(1).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3\tS4\n";

    fn write_vcf(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{HEADER}").unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
        f
    }

    fn write_map(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
        f
    }

    #[test]
    fn test_build_filters_by_mac() {
        let vcf = write_vcf(&[
            "chr1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t0|0\t0|0\t0|0\t0|1", // MAC=1, dropped (min_mac=2)
            "chr1\t200\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t0|1\t0|0\t0|0", // MAC=2, kept
        ]);
        let map = write_map(&["chr1 0.0 100", "chr1 1.0 200"]);
        let genmap = GeneticMap::from_path(map.path()).unwrap();
        let panel =
            GenotypePanel::build(vcf.path(), &genmap, &HashSet::new(), 2).unwrap();
        assert_eq!(panel.n_markers(), 1);
        assert_eq!(panel.pos(0), 200);
    }

    #[test]
    fn test_strictly_increasing_positions_enforced() {
        let vcf = write_vcf(&[
            "chr1\t200\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t0|1\t0|0\t0|0",
            "chr1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t0|1\t0|0\t0|0",
        ]);
        let map = write_map(&["chr1 0.0 100", "chr1 1.0 200"]);
        let genmap = GeneticMap::from_path(map.path()).unwrap();
        assert!(GenotypePanel::build(vcf.path(), &genmap, &HashSet::new(), 1).is_err());
    }

    #[test]
    fn test_ploidy_and_sample_ids_preserved() {
        let vcf = write_vcf(&["chr1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t1\t0|1\t0|0"]);
        let map = write_map(&["chr1 0.0 100"]);
        let genmap = GeneticMap::from_path(map.path()).unwrap();
        let panel = GenotypePanel::build(vcf.path(), &genmap, &HashSet::new(), 1).unwrap();
        assert_eq!(panel.sample_id(1), "S2");
        assert!(!panel.is_diploid(1));
        assert!(panel.is_diploid(0));
    }
}
