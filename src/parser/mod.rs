//! Parsers for genomic file formats.

pub mod util;
pub mod vcf;

pub use vcf::{GenotypeRecord, VcfReader};
