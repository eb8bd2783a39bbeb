//! hapibd - PBWT-based identity-by-descent (IBD) and homozygosity-by-descent
//! (HBD) segment detector over phased genotype panels.
//!
//! # Pipeline
//!
//! - [`panel::GenotypePanel`] loads one chromosome's phased genotype matrix,
//!   filtered by minor allele count.
//! - [`pbwt::PbwtState`] advances the positional Burrows-Wheeler sort one
//!   marker at a time.
//! - [`window::partition_windows`] splits the marker axis into overlapping
//!   per-worker windows.
//! - [`seed::scan_window`] finds candidate IBS seeds within a window.
//! - [`extend::extend`] extends a seed across genotyping gaps and classifies
//!   it as IBD or HBD.
//! - [`dispatch::run`] drives one OS thread per window and writes surviving
//!   segments to the [`output::OutputSink`]s.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extend;
pub mod genmap;
pub mod keyvalue;
pub mod output;
pub mod panel;
pub mod parser;
pub mod pbwt;
pub mod seed;
pub mod types;
pub mod window;

pub use config::{Args, Config};
pub use error::{HapIbdError, Result};
pub use types::{Chromosome, Haplotype, Marker, OutputSegment, SeedRecord, SegmentKind};
