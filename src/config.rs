//! CLI arguments and validated run configuration (spec §6).
//!
//! `Args` is the raw clap-derived parse of the `key=value` command line
//! (translated to ordinary long flags by [`crate::keyvalue`] before reaching
//! clap); [`Config`] is the validated, defaulted configuration the rest of
//! the pipeline consumes, built the way the teacher's `main()` builds its
//! `Config` from `Args` with `bail!`-style range checks.

use std::path::PathBuf;

use clap::Parser;

use crate::error::HapIbdError;

/// PBWT-based IBD/HBD segment detector.
#[derive(Parser, Debug)]
#[command(name = "hapibd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Phased genotype input (VCF, optionally gzipped).
    #[arg(long = "gt")]
    pub gt: PathBuf,

    /// PLINK genetic map.
    #[arg(long = "map")]
    pub map: PathBuf,

    /// Output path prefix (writes `<out>.ibd.gz`, `<out>.hbd.gz`, `<out>.log`).
    #[arg(long = "out")]
    pub out: PathBuf,

    /// Newline-delimited sample IDs to exclude.
    #[arg(long = "excludesamples")]
    pub excludesamples: Option<PathBuf>,

    /// Minimum minor allele count for a marker to be retained.
    #[arg(long = "min-mac", default_value_t = 2)]
    pub min_mac: u32,

    /// Minimum seed length, in cM.
    #[arg(long = "min-seed", default_value_t = 2.0)]
    pub min_seed: f64,

    /// Maximum gap, in bp, a seed may be extended across (-1 disables extension).
    #[arg(long = "max-gap", default_value_t = 1000)]
    pub max_gap: i64,

    /// Minimum length, in cM, of a gap-spanning extension run. Defaults to
    /// `min(1.0, min-seed)`.
    #[arg(long = "min-extend")]
    pub min_extend: Option<f64>,

    /// Minimum final segment length, in cM, required for output.
    #[arg(long = "min-output", default_value_t = 2.0)]
    pub min_output: f64,

    /// Minimum marker count for a seed.
    #[arg(long = "min-markers", default_value_t = 100)]
    pub min_markers: usize,

    /// Number of worker threads (defaults to the number of CPUs).
    #[arg(long = "nthreads")]
    pub nthreads: Option<usize>,
}

/// Validated, defaulted configuration consumed by the detection pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub gt: PathBuf,
    pub map: PathBuf,
    pub out: PathBuf,
    pub excludesamples: Option<PathBuf>,
    pub min_mac: u32,
    pub min_seed: f64,
    pub max_gap: i64,
    pub min_extend: f64,
    pub min_output: f64,
    pub min_markers: usize,
    pub nthreads: usize,
}

impl Config {
    /// Validate an `Args` parse and resolve defaults into a `Config`.
    pub fn from_args(args: Args) -> Result<Config, HapIbdError> {
        if args.min_mac < 1 {
            return Err(HapIbdError::Config("min-mac must be >= 1".to_string()));
        }
        if !(args.min_seed > 0.0) {
            return Err(HapIbdError::Config("min-seed must be > 0".to_string()));
        }
        if args.max_gap < -1 {
            return Err(HapIbdError::Config(
                "max-gap must be >= -1 (-1 disables extension)".to_string(),
            ));
        }
        if !(args.min_output > 0.0) {
            return Err(HapIbdError::Config("min-output must be > 0".to_string()));
        }
        if args.min_markers < 1 {
            return Err(HapIbdError::Config("min-markers must be >= 1".to_string()));
        }

        let min_extend = match args.min_extend {
            Some(v) => {
                if !(v > 0.0 && v <= args.min_seed) {
                    return Err(HapIbdError::Config(
                        "min-extend must be in (0, min-seed]".to_string(),
                    ));
                }
                v
            }
            None => args.min_seed.min(1.0),
        };

        let nthreads = match args.nthreads {
            Some(0) => {
                return Err(HapIbdError::Config("nthreads must be >= 1".to_string()));
            }
            Some(n) => n,
            None => num_cpus::get().max(1),
        };

        if args.out.is_dir() {
            return Err(HapIbdError::Config(format!(
                "out path {} is a directory",
                args.out.display()
            )));
        }
        if args.out == args.gt || args.out == args.map {
            return Err(HapIbdError::Config(
                "out must not be equal to an input path".to_string(),
            ));
        }
        if let Some(excl) = &args.excludesamples {
            if &args.out == excl {
                return Err(HapIbdError::Config(
                    "out must not be equal to an input path".to_string(),
                ));
            }
        }

        Ok(Config {
            gt: args.gt,
            map: args.map,
            out: args.out,
            excludesamples: args.excludesamples,
            min_mac: args.min_mac,
            min_seed: args.min_seed,
            max_gap: args.max_gap,
            min_extend,
            min_output: args.min_output,
            min_markers: args.min_markers,
            nthreads,
        })
    }

    /// Minimum marker count required for an extension run to count as a
    /// full seed in its own right (used by `extendStart`'s duplicate check).
    pub fn min_extend_markers(&self) -> i64 {
        ((self.min_extend / self.min_seed) * self.min_markers as f64).floor() as i64 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args(dir: &std::path::Path) -> Args {
        Args {
            gt: dir.join("in.vcf.gz"),
            map: dir.join("in.map"),
            out: dir.join("out"),
            excludesamples: None,
            min_mac: 2,
            min_seed: 2.0,
            max_gap: 1000,
            min_extend: None,
            min_output: 2.0,
            min_markers: 100,
            nthreads: None,
        }
    }

    #[test]
    fn test_defaults_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::from_args(base_args(dir.path())).unwrap();
        assert_eq!(cfg.min_extend, 1.0);
        assert!(cfg.nthreads >= 1);
    }

    #[test]
    fn test_min_extend_clamped_to_min_seed() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args(dir.path());
        args.min_seed = 0.5;
        let cfg = Config::from_args(args).unwrap();
        assert_eq!(cfg.min_extend, 0.5);
    }

    #[test]
    fn test_out_equal_to_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args(dir.path());
        args.out = args.gt.clone();
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_invalid_min_extend_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args(dir.path());
        args.min_extend = Some(args.min_seed + 1.0);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_negative_max_gap_disables_extension_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args(dir.path());
        args.max_gap = -1;
        assert!(Config::from_args(args).is_ok());
    }

    #[test]
    fn test_max_gap_below_sentinel_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args(dir.path());
        args.max_gap = -2;
        assert!(Config::from_args(args).is_err());
    }
}
