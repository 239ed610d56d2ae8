//! Sample identifiers, keep-list parsing and intersection.
//!
//! Sample order is the column order of the genotype source and is
//! carried unchanged into every GRM output.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// A sample column: individual ID plus an optional pedigree family ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: String,
    pub family_id: Option<String>,
}

impl Sample {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family_id: None,
        }
    }

    pub fn with_family(family_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family_id: Some(family_id.into()),
        }
    }

    /// Family ID for two-column ID files. Falls back to the sample ID
    /// (PLINK `--double-id` convention).
    pub fn family_or_id(&self) -> &str {
        self.family_id.as_deref().unwrap_or(&self.id)
    }

    /// Drop the family ID so output doubles the sample ID.
    pub fn doubled(mut self) -> Self {
        self.family_id = None;
        self
    }
}

/// Result of intersecting sample IDs from multiple sources.
#[derive(Debug, Clone)]
pub struct SampleIntersection {
    /// Sample IDs in the intersection, in the order they appear in the primary source.
    pub ids: Vec<String>,
    /// Indices into each source for the intersected samples.
    pub indices: Vec<Vec<usize>>,
}

/// Intersect sample IDs from multiple sources.
///
/// Returns the intersection in the order they appear in the first (primary) source.
pub fn intersect_samples(sources: &[&[String]]) -> SampleIntersection {
    if sources.is_empty() {
        return SampleIntersection {
            ids: Vec::new(),
            indices: Vec::new(),
        };
    }

    let maps: Vec<HashMap<&str, usize>> = sources
        .iter()
        .map(|ids| {
            ids.iter()
                .enumerate()
                .map(|(i, id)| (id.as_str(), i))
                .collect()
        })
        .collect();

    let mut result_ids = Vec::new();
    let mut result_indices: Vec<Vec<usize>> = vec![Vec::new(); sources.len()];

    for (primary_idx, id) in sources[0].iter().enumerate() {
        let in_all = maps[1..].iter().all(|m| m.contains_key(id.as_str()));
        if in_all {
            result_ids.push(id.clone());
            result_indices[0].push(primary_idx);
            for (src, map) in maps[1..].iter().enumerate() {
                result_indices[src + 1].push(map[id.as_str()]);
            }
        }
    }

    SampleIntersection {
        ids: result_ids,
        indices: result_indices,
    }
}

/// Parse a keep file: one sample per line, either `IID` or `FID IID`.
/// Blank lines and `#` comments are ignored.
pub fn read_keep_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keep file: {}", path.display()))?;
    let mut ids = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [iid] | [_, iid] => ids.push(iid.to_string()),
            _ => bail!(
                "Keep file line {} has {} fields, expected 1 or 2",
                line_num + 1,
                fields.len()
            ),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_family_or_id() {
        assert_eq!(Sample::new("S1").family_or_id(), "S1");
        assert_eq!(Sample::with_family("F1", "S1").family_or_id(), "F1");
        assert_eq!(Sample::with_family("F1", "S1").doubled().family_or_id(), "S1");
    }

    #[test]
    fn test_intersect_two_sources() {
        let src1 = ids(&["A", "B", "C", "D"]);
        let src2 = ids(&["C", "A", "E"]);

        let result = intersect_samples(&[&src1, &src2]);
        assert_eq!(result.ids, vec!["A", "C"]);
        assert_eq!(result.indices[0], vec![0, 2]);
        assert_eq!(result.indices[1], vec![1, 0]);
    }

    #[test]
    fn test_empty_intersection() {
        let s1 = ids(&["A", "B"]);
        let s2 = ids(&["C", "D"]);
        assert!(intersect_samples(&[&s1, &s2]).ids.is_empty());
    }

    #[test]
    fn test_read_keep_file() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# samples to keep").unwrap();
        writeln!(f, "S1").unwrap();
        writeln!(f, "FAM2 S2").unwrap();
        writeln!(f).unwrap();
        drop(f);

        assert_eq!(read_keep_file(&path).unwrap(), vec!["S1", "S2"]);
    }

    #[test]
    fn test_read_keep_file_rejects_wide_lines() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "F1 S1 extra").unwrap();
        drop(f);

        assert!(read_keep_file(&path).is_err());
    }
}
