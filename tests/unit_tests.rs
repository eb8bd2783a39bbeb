//! Cross-module invariant tests that exercise the public API surface
//! (complementing the `#[cfg(test)]` unit tests embedded in each module).

use hapibd::config::{Args, Config};
use hapibd::genmap::GeneticMap;
use hapibd::panel::GenotypePanel;
use hapibd::types::{copy_of, haplotype_of, sample_of};
use std::collections::HashSet;
use std::io::Write;

fn args_for(dir: &std::path::Path, min_seed: f64, min_markers: usize, max_gap: i64) -> Args {
    Args {
        gt: dir.join("in.vcf"),
        map: dir.join("in.map"),
        out: dir.join("out"),
        excludesamples: None,
        min_mac: 1,
        min_seed,
        max_gap,
        min_extend: None,
        min_output: min_seed,
        min_markers,
        nthreads: None,
    }
}

fn write_panel(dir: &std::path::Path, vcf_lines: &[String], map_lines: &[String]) -> GenotypePanel {
    let vcf_path = dir.join("in.vcf");
    let mut f = std::fs::File::create(&vcf_path).unwrap();
    writeln!(
        f,
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2"
    )
    .unwrap();
    for l in vcf_lines {
        writeln!(f, "{l}").unwrap();
    }
    let map_path = dir.join("in.map");
    let mut m = std::fs::File::create(&map_path).unwrap();
    for l in map_lines {
        writeln!(m, "{l}").unwrap();
    }
    let genmap = GeneticMap::from_path(&map_path).unwrap();
    GenotypePanel::build(&vcf_path, &genmap, &HashSet::new(), 1).unwrap()
}

#[test]
fn test_haplotype_copy_roundtrip_is_consistent() {
    for sample in 0..10 {
        for copy in 0..2 {
            let h = haplotype_of(sample, copy);
            assert_eq!(sample_of(h), sample);
            assert_eq!(copy_of(h), copy);
        }
    }
}

#[test]
fn test_config_rejects_zero_min_markers() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = args_for(dir.path(), 2.0, 100, 1000);
    args.min_markers = 0;
    assert!(Config::from_args(args).is_err());
}

#[test]
fn test_panel_haploid_sample_duplicated_and_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let vcf_lines = vec!["chr1\t1000\t.\tA\tG\t.\tPASS\t.\tGT\t1\t0|1".to_string()];
    let map_lines = vec!["chr1 0.0 1000".to_string()];
    let panel = write_panel(dir.path(), &vcf_lines, &map_lines);
    assert!(!panel.is_diploid(0));
    assert!(panel.is_diploid(1));
    // Both copy slots of the haploid sample carry the single observed allele.
    assert_eq!(panel.allele(0, haplotype_of(0, 0)), 1);
    assert_eq!(panel.allele(0, haplotype_of(0, 1)), 1);
}

#[test]
fn test_panel_gen_pos_all_matches_interpolation() {
    let dir = tempfile::tempdir().unwrap();
    let mut vcf_lines = Vec::new();
    let mut map_lines = Vec::new();
    for m in 0..10 {
        let pos = 1000 + m * 1000;
        map_lines.push(format!("chr1 {:.1} {}", m as f64, pos));
        vcf_lines.push(format!("chr1\t{pos}\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|0"));
    }
    let panel = write_panel(dir.path(), &vcf_lines, &map_lines);
    let all = panel.gen_pos_all();
    assert_eq!(all.len(), panel.n_markers());
    for m in 0..panel.n_markers() {
        assert_eq!(all[m], panel.gen_pos(m));
    }
}

#[test]
fn test_unphased_genotype_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vcf_lines = vec!["chr1\t1000\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\t0|1".to_string()];
    let map_lines = vec!["chr1 0.0 1000".to_string()];
    let vcf_path = dir.path().join("in.vcf");
    let mut f = std::fs::File::create(&vcf_path).unwrap();
    writeln!(
        f,
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2"
    )
    .unwrap();
    for l in &vcf_lines {
        writeln!(f, "{l}").unwrap();
    }
    let map_path = dir.path().join("in.map");
    let mut m = std::fs::File::create(&map_path).unwrap();
    for l in &map_lines {
        writeln!(m, "{l}").unwrap();
    }
    let genmap = GeneticMap::from_path(&map_path).unwrap();
    assert!(GenotypePanel::build(&vcf_path, &genmap, &HashSet::new(), 1).is_err());
}

#[test]
fn test_missing_genotype_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vcf_path = dir.path().join("in.vcf");
    let mut f = std::fs::File::create(&vcf_path).unwrap();
    writeln!(
        f,
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n\
         chr1\t1000\t.\tA\tG\t.\tPASS\t.\tGT\t.|1\t0|1"
    )
    .unwrap();
    let map_path = dir.path().join("in.map");
    let mut m = std::fs::File::create(&map_path).unwrap();
    writeln!(m, "chr1 0.0 1000").unwrap();
    let genmap = GeneticMap::from_path(&map_path).unwrap();
    assert!(GenotypePanel::build(&vcf_path, &genmap, &HashSet::new(), 1).is_err());
}

#[test]
fn test_excluded_samples_removed_from_panel() {
    let dir = tempfile::tempdir().unwrap();
    let vcf_path = dir.path().join("in.vcf");
    let mut f = std::fs::File::create(&vcf_path).unwrap();
    writeln!(
        f,
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n\
         chr1\t1000\t.\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|0"
    )
    .unwrap();
    let map_path = dir.path().join("in.map");
    let mut m = std::fs::File::create(&map_path).unwrap();
    writeln!(m, "chr1 0.0 1000").unwrap();
    let genmap = GeneticMap::from_path(&map_path).unwrap();
    let mut excl = HashSet::new();
    excl.insert("S1".to_string());
    let panel = GenotypePanel::build(&vcf_path, &genmap, &excl, 1).unwrap();
    assert_eq!(panel.n_samples(), 1);
    assert_eq!(panel.sample_id(0), "S2");
}
