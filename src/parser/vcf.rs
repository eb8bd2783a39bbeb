//! Streaming phased-genotype record reader (spec §4.1's "external record
//! iterator"), VCF decoding is a Non-goal: this parses just enough of the
//! text format (`#CHROM` header, `GT` in `FORMAT`, `|`-phased alleles) to
//! drive the panel builder, and rejects anything it can't interpret as
//! phased and complete.

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::parser::util::create_buffered_reader;

/// One marker's genotype row: bp position, allele count, and the flat
/// `[h0_allele, h1_allele, ...]` row over the *retained* haplotypes.
pub struct GenotypeRecord {
    pub chrom: String,
    pub pos: i64,
    pub n_alleles: usize,
    pub alleles: Vec<u8>,
}

/// Streaming VCF reader yielding one [`GenotypeRecord`] per data line.
///
/// Samples named in `excluded` are dropped from every record's haplotype
/// row entirely, so their haplotype columns never enter the `2N` index
/// space (spec §6 `excludesamples`).
pub struct VcfReader {
    reader: Box<dyn BufRead + Send>,
    /// Sample ids retained, in the haplotype-index order they appear.
    pub sample_ids: Vec<String>,
    /// Per-sample ploidy, `true` = diploid, learned from the first marker.
    pub is_diploid: Vec<bool>,
    kept_columns: Vec<usize>,
    line: String,
    ploidy_known: bool,
}

impl VcfReader {
    pub fn new(path: &Path, excluded: &ahash::AHashSet<String>) -> Result<VcfReader> {
        let file = File::open(path).context("failed to open genotype file")?;
        let mut reader = create_buffered_reader(file, path);

        let mut line = String::new();
        let sample_ids;
        let kept_columns;
        loop {
            line.clear();
            let n = reader.read_line(&mut line).context("failed to read VCF header")?;
            if n == 0 {
                bail!("genotype file has no #CHROM header line");
            }
            if line.starts_with("##") {
                continue;
            }
            if line.starts_with("#CHROM") {
                let fields: Vec<&str> = line.trim_end().split('\t').collect();
                if fields.len() <= 9 {
                    bail!("genotype file has no sample columns");
                }
                let mut ids = Vec::new();
                let mut cols = Vec::new();
                for (idx, name) in fields[9..].iter().enumerate() {
                    if !excluded.contains(*name) {
                        ids.push(name.to_string());
                        cols.push(9 + idx);
                    }
                }
                if ids.is_empty() {
                    bail!("all samples excluded, nothing to do");
                }
                sample_ids = ids;
                kept_columns = cols;
                break;
            }
            bail!("unexpected line before #CHROM header");
        }

        Ok(VcfReader {
            reader,
            is_diploid: vec![true; sample_ids.len()],
            sample_ids,
            kept_columns,
            line: String::new(),
            ploidy_known: false,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Read the next marker record, or `None` at EOF.
    pub fn next_record(&mut self) -> Result<Option<GenotypeRecord>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .context("failed to read VCF record")?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return self.parse_line(trimmed).map(Some);
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<GenotypeRecord> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 10 {
            bail!("VCF data line has fewer than 10 columns");
        }
        let chrom = fields[0].to_string();
        let pos: i64 = fields[1]
            .parse()
            .with_context(|| format!("bad POS '{}'", fields[1]))?;
        let alt = fields[4];
        let n_alleles = if alt == "." || alt.is_empty() {
            1
        } else {
            1 + alt.split(',').count()
        };

        let gt_idx = fields[8]
            .split(':')
            .position(|k| k == "GT")
            .context("FORMAT column has no GT subfield")?;

        let n_haps = self.kept_columns.len() * 2;
        let mut alleles = vec![0u8; n_haps];

        for (i, &col) in self.kept_columns.iter().enumerate() {
            let sample_field = fields
                .get(col)
                .with_context(|| format!("missing sample column {col}"))?;
            let gt_token = sample_field
                .split(':')
                .nth(gt_idx)
                .with_context(|| format!("sample column {col} missing GT subfield"))?;

            let (a0, a1, diploid) = parse_genotype(gt_token, n_alleles)
                .with_context(|| format!("sample '{}' at {}:{}", self.sample_ids[i], chrom, pos))?;

            if !self.ploidy_known {
                self.is_diploid[i] = diploid;
            }
            alleles[2 * i] = a0;
            alleles[2 * i + 1] = a1;
        }
        self.ploidy_known = true;

        Ok(GenotypeRecord {
            chrom,
            pos,
            n_alleles,
            alleles,
        })
    }
}

/// Parse one sample's `GT` token into `(copy0, copy1, is_diploid)`.
///
/// Haploid calls (a single allele, no separator) are duplicated into both
/// copy slots so the phantom second copy tracks the real one through the
/// PBWT; callers must still exclude it from output (spec §3).
fn parse_genotype(token: &str, n_alleles: usize) -> Result<(u8, u8, bool)> {
    if token.contains('/') {
        bail!("unphased genotype '{token}', input must be fully phased");
    }
    if let Some((l, r)) = token.split_once('|') {
        let a0 = parse_allele(l, n_alleles)?;
        let a1 = parse_allele(r, n_alleles)?;
        Ok((a0, a1, true))
    } else {
        let a = parse_allele(token, n_alleles)?;
        Ok((a, a, false))
    }
}

fn parse_allele(s: &str, n_alleles: usize) -> Result<u8> {
    if s == "." {
        bail!("missing genotype call '.', input must be complete");
    }
    let a: u8 = s.parse().with_context(|| format!("bad allele '{s}'"))?;
    if a as usize >= n_alleles {
        bail!("allele '{a}' out of range, marker declares only {n_alleles} allele(s)");
    }
    Ok(a)
}
