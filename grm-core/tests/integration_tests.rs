//! Integration tests: GRM computation and export against fixture data.
//!
//! `tests/fixtures/synthetic_5x10.dosages.tsv` holds a small fully-called
//! dataset; `synthetic_5x10.expected.rel` is its GRM evaluated directly
//! from the pairwise formula in double precision.

use std::path::{Path, PathBuf};

use grm_core::grm::{compute_grm, compute_grm_from_dosages, AcceptAll, Grm, GrmConfig, GrmFormat};
use grm_geno::grm_io;
use grm_geno::plink::prefixed_path;

/// Helper to get the path to test fixtures.
fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// The 5-sample, 10-variant synthetic dataset.
struct SyntheticDataset {
    sample_ids: Vec<String>,
    /// Marker-major dosages.
    dosages: Vec<Vec<f64>>,
}

impl SyntheticDataset {
    fn load() -> Self {
        let path = fixtures_dir().join("synthetic_5x10.dosages.tsv");
        let contents = std::fs::read_to_string(&path).expect("Failed to read dosage fixture");
        let mut lines = contents.lines();
        let header = lines.next().expect("empty fixture");
        let sample_ids = header.split('\t').skip(1).map(String::from).collect();
        let dosages = lines
            .filter(|l| !l.is_empty())
            .map(|l| l.split('\t').skip(1).map(|v| v.parse().unwrap()).collect())
            .collect();
        Self {
            sample_ids,
            dosages,
        }
    }

    fn grm(&self) -> Grm {
        compute_grm_from_dosages(&self.sample_ids, &self.dosages).expect("GRM computation failed")
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

mod golden {
    use super::*;

    #[test]
    fn test_matches_reference_matrix() {
        let data = SyntheticDataset::load();
        let grm = data.grm();
        let expected = grm_io::read_rel(&fixtures_dir().join("synthetic_5x10.expected.rel"))
            .expect("Failed to read expected GRM");

        assert_eq!(grm.n_samples(), 5);
        assert_eq!(grm.n_variants(), 10);
        for (i, j, want) in expected.iter_pairs() {
            let got = grm.value(i, j);
            assert!(
                (got - want).abs() < 1e-9,
                "GRM[{},{}]: got {}, expected {}",
                i,
                j,
                got,
                want
            );
        }
    }

    #[test]
    fn test_fully_called_counts_equal_variant_total() {
        let grm = SyntheticDataset::load().grm();
        assert!(grm.counts().as_slice().iter().all(|&c| c == 10));
    }
}

mod export {
    use super::*;

    #[test]
    fn test_rel_layout() {
        let dir = tempfile::tempdir().unwrap();
        let data = SyntheticDataset::load();
        let grm = data.grm();
        let paths = grm.export(GrmFormat::Rel, &dir.path().join("syn")).unwrap();

        let lines = read_lines(&paths[0]);
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            let fields: Vec<f64> = line.split('\t').map(|v| v.parse().unwrap()).collect();
            assert_eq!(fields.len(), i + 1, "row {} has wrong width", i);
            // Shortest round-trip formatting reproduces the value exactly.
            for (j, v) in fields.iter().enumerate() {
                assert_eq!(*v, grm.value(i, j));
            }
        }
    }

    #[test]
    fn test_gcta_grm_layout() {
        let dir = tempfile::tempdir().unwrap();
        let grm = SyntheticDataset::load().grm();
        let paths = grm.export(GrmFormat::GctaGrm, &dir.path().join("syn")).unwrap();

        let lines = read_lines(&paths[0]);
        assert_eq!(lines.len(), 15);
        let mut expected_pairs = Vec::new();
        for i in 1..=5 {
            for j in 1..=i {
                expected_pairs.push((i, j));
            }
        }
        for (line, &(i, j)) in lines.iter().zip(&expected_pairs) {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 4);
            assert_eq!(fields[0].parse::<usize>().unwrap(), i);
            assert_eq!(fields[1].parse::<usize>().unwrap(), j);
            assert_eq!(fields[2].parse::<usize>().unwrap(), 10);
            let v: f64 = fields[3].parse().unwrap();
            assert_eq!(v, grm.value(i - 1, j - 1));
        }
    }

    #[test]
    fn test_gcta_grm_gz_matches_plain() {
        let dir = tempfile::tempdir().unwrap();
        let grm = SyntheticDataset::load().grm();
        grm.export(GrmFormat::GctaGrm, &dir.path().join("plain")).unwrap();
        let gz = grm.export(GrmFormat::GctaGrmGz, &dir.path().join("packed")).unwrap();

        let bytes = std::fs::read(&gz[0]).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        let plain = Grm::read(GrmFormat::GctaGrm, &dir.path().join("plain")).unwrap();
        let packed = Grm::read(GrmFormat::GctaGrmGz, &dir.path().join("packed")).unwrap();
        assert_eq!(plain, packed);
    }

    #[test]
    fn test_gcta_bin_length_and_reencode() {
        let dir = tempfile::tempdir().unwrap();
        let grm = SyntheticDataset::load().grm();
        let first = grm.export(GrmFormat::GctaGrmBin, &dir.path().join("a")).unwrap();
        for path in &first[..2] {
            assert_eq!(std::fs::metadata(path).unwrap().len(), 4 * 15);
        }

        let back = Grm::read(GrmFormat::GctaGrmBin, &dir.path().join("a")).unwrap();
        for (i, j, v) in back.values().iter_pairs() {
            assert_eq!(v, grm.value(i, j) as f32 as f64);
        }
        let second = back.export(GrmFormat::GctaGrmBin, &dir.path().join("b")).unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
        }
    }

    #[test]
    fn test_id_file_doubles_sample_ids() {
        let dir = tempfile::tempdir().unwrap();
        let grm = SyntheticDataset::load().grm();
        let paths = grm.export(GrmFormat::Rel, &dir.path().join("syn")).unwrap();
        assert_eq!(paths[1], prefixed_path(&dir.path().join("syn"), "rel.id"));
        assert_eq!(
            read_lines(&paths[1]),
            vec!["S1\tS1", "S2\tS2", "S3\tS3", "S4\tS4", "S5\tS5"]
        );
    }

    #[test]
    fn test_failed_export_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let grm = SyntheticDataset::load().grm();
        let missing_dir = dir.path().join("no/such/dir/syn");
        assert!(grm.export(GrmFormat::GctaGrmBin, &missing_dir).is_err());
        assert!(!prefixed_path(&missing_dir, "grm.bin").exists());
    }
}

mod plink_source {
    use super::*;
    use grm_geno::plink::PlinkReader;
    use grm_geno::DosageMatrix;
    use std::io::Write;

    /// Two-bit PLINK genotype code for an A1 dosage.
    fn bed_code(dosage: f64) -> u8 {
        if dosage.is_nan() {
            0b01
        } else {
            match dosage as u8 {
                2 => 0b00,
                1 => 0b10,
                _ => 0b11,
            }
        }
    }

    fn write_fileset(prefix: &Path, sample_ids: &[String], dosages: &[Vec<f64>]) {
        let mut fam = std::fs::File::create(prefixed_path(prefix, "fam")).unwrap();
        for id in sample_ids {
            writeln!(fam, "{} {} 0 0 0 -9", id, id).unwrap();
        }
        let mut bim = std::fs::File::create(prefixed_path(prefix, "bim")).unwrap();
        let mut bed = vec![0x6C, 0x1B, 0x01];
        for (m, g) in dosages.iter().enumerate() {
            writeln!(bim, "1\tv{}\t0\t{}\tA\tG", m + 1, 1000 * (m + 1)).unwrap();
            for block in g.chunks(4) {
                let mut byte = 0u8;
                for (k, &d) in block.iter().enumerate() {
                    byte |= bed_code(d) << (2 * k);
                }
                bed.push(byte);
            }
        }
        std::fs::write(prefixed_path(prefix, "bed"), bed).unwrap();
    }

    #[test]
    fn test_plink_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let data = SyntheticDataset::load();
        let mut dosages = data.dosages.clone();
        // One missing call exercises the per-pair counts.
        dosages[3][2] = f64::NAN;
        let prefix = dir.path().join("syn");
        write_fileset(&prefix, &data.sample_ids, &dosages);

        let mut plink = PlinkReader::new(&prefix).unwrap();
        let mut memory = DosageMatrix::new(data.sample_ids.clone(), dosages).unwrap();
        let config = GrmConfig { chunk_size: 3 };
        let from_plink = compute_grm(&mut plink, &AcceptAll, &config).unwrap();
        let from_memory = compute_grm(&mut memory, &AcceptAll, &config).unwrap();

        assert_eq!(from_plink.values(), from_memory.values());
        assert_eq!(from_plink.counts(), from_memory.counts());
        assert_eq!(from_plink.variant_count(2, 0), 9);
        assert_eq!(from_plink.variant_count(1, 0), 10);
    }
}
