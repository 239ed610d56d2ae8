//! Relationship-matrix file formats.
//!
//! All matrix formats list the lower triangle of a symmetric n x n
//! matrix in row-major order: row i = 1..n, column j = 1..i. Entry
//! (i, j) is pair number `i * (i + 1) / 2 + j` (0-based).
//!
//! - `.rel` (PLINK `--make-rel`): one tab-separated line per row i
//!   holding values (i, 1..i).
//! - `.grm` / `.grm.gz` (GCTA text): one line per pair,
//!   `i <TAB> j <TAB> n_variants <TAB> value`, 1-based indices.
//! - `.grm.bin` / `.grm.N.bin` (GCTA binary): one little-endian f32 per
//!   pair, no header, no padding. The N file holds variant counts.
//! - `.rel.id` / `.grm.id`: `family_id <TAB> sample_id`, one line per
//!   sample in matrix order.
//!
//! Text output prints f64 values with the shortest representation that
//! round-trips. Binary output narrows to f32.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use memmap2::Mmap;
use tracing::{debug, warn};

use grm_linalg::triangular::{packed_len, pair_from_index, triangular_dim};
use grm_linalg::PackedSymmetric;

use crate::error::GrmError;
use crate::sample::Sample;

/// Bytes per entry in `.grm.bin` and `.grm.N.bin`.
pub const BYTES_PER_ENTRY: usize = 4;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const WRITE_BUFFER: usize = 64 * 1024;

fn dim_mismatch(values: usize, counts: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("value matrix is {values}x{values} but count matrix is {counts}x{counts}"),
    )
}

// ---------------------------------------------------------------------------
// Stream writers
// ---------------------------------------------------------------------------

/// Write the `.rel` layout: row i holds i + 1 tab-separated values.
pub fn write_rel<W: Write + ?Sized>(w: &mut W, values: &PackedSymmetric<f64>) -> io::Result<()> {
    for row in values.rows() {
        for (j, v) in row.iter().enumerate() {
            if j > 0 {
                w.write_all(b"\t")?;
            }
            write!(w, "{}", v)?;
        }
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Write the GCTA text layout: `i j count value` per pair, 1-based.
pub fn write_gcta_grm<W: Write + ?Sized>(
    w: &mut W,
    values: &PackedSymmetric<f64>,
    counts: &PackedSymmetric<u32>,
) -> io::Result<()> {
    if values.n() != counts.n() {
        return Err(dim_mismatch(values.n(), counts.n()));
    }
    for (i, (vrow, crow)) in values.rows().zip(counts.rows()).enumerate() {
        for (j, (v, c)) in vrow.iter().zip(crow).enumerate() {
            writeln!(w, "{}\t{}\t{}\t{}", i + 1, j + 1, c, v)?;
        }
    }
    Ok(())
}

fn write_f32_le<W, I>(w: &mut W, entries: I) -> io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = f32>,
{
    for x in entries {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

/// Write `.grm.bin` values, narrowed to f32.
pub fn write_gcta_grm_bin<W: Write + ?Sized>(
    w: &mut W,
    values: &PackedSymmetric<f64>,
) -> io::Result<()> {
    write_f32_le(w, values.as_slice().iter().map(|&v| v as f32))
}

/// Write `.grm.N.bin` variant counts as f32.
pub fn write_gcta_grm_n_bin<W: Write + ?Sized>(
    w: &mut W,
    counts: &PackedSymmetric<u32>,
) -> io::Result<()> {
    write_f32_le(w, counts.as_slice().iter().map(|&c| c as f32))
}

/// Write a two-column ID file, one `family_id<TAB>sample_id` line per sample.
pub fn write_id_file<W: Write + ?Sized>(w: &mut W, samples: &[Sample]) -> io::Result<()> {
    for s in samples {
        writeln!(w, "{}\t{}", s.family_or_id(), s.id)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File exporters
// ---------------------------------------------------------------------------

/// Run `body` against a buffered writer on `path`. On any failure the
/// partial file is removed.
fn write_output<F>(path: &Path, compress: bool, body: F) -> Result<(), GrmError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let result = File::create(path).and_then(|file| {
        if compress {
            let mut w =
                BufWriter::with_capacity(WRITE_BUFFER, GzEncoder::new(file, Compression::default()));
            body(&mut w)?;
            w.into_inner().map_err(|e| e.into_error())?.finish()?;
        } else {
            let mut w = BufWriter::with_capacity(WRITE_BUFFER, file);
            body(&mut w)?;
            w.flush()?;
        }
        Ok(())
    });

    match result {
        Ok(()) => {
            debug!("Wrote {}", path.display());
            Ok(())
        }
        Err(e) => {
            remove_partial(path);
            Err(GrmError::io(path, e))
        }
    }
}

/// Delete an output file left behind by a failed export.
pub fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove partial output {}: {}", path.display(), e);
        }
    }
}

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Export a `.rel` file.
pub fn export_rel(path: &Path, values: &PackedSymmetric<f64>) -> Result<(), GrmError> {
    write_output(path, false, |w| write_rel(w, values))
}

/// Export a GCTA text GRM. Paths ending in `.gz` are gzip-compressed.
pub fn export_gcta_grm(
    path: &Path,
    values: &PackedSymmetric<f64>,
    counts: &PackedSymmetric<u32>,
) -> Result<(), GrmError> {
    write_output(path, is_gz(path), |w| write_gcta_grm(w, values, counts))
}

/// Export the GCTA binary pair (`.grm.bin`, `.grm.N.bin`). If the second
/// file fails, the first is removed as well.
pub fn export_gcta_grm_bin(
    bin_path: &Path,
    n_bin_path: &Path,
    values: &PackedSymmetric<f64>,
    counts: &PackedSymmetric<u32>,
) -> Result<(), GrmError> {
    if values.n() != counts.n() {
        return Err(GrmError::io(bin_path, dim_mismatch(values.n(), counts.n())));
    }
    write_output(bin_path, false, |w| write_gcta_grm_bin(w, values))?;
    if let Err(e) = write_output(n_bin_path, false, |w| write_gcta_grm_n_bin(w, counts)) {
        remove_partial(bin_path);
        return Err(e);
    }
    Ok(())
}

/// Export a `.rel.id` / `.grm.id` file.
pub fn export_id_file(path: &Path, samples: &[Sample]) -> Result<(), GrmError> {
    write_output(path, false, |w| write_id_file(w, samples))
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Open a text file, transparently decompressing gzip input.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>, GrmError> {
    let file = File::open(path).map_err(|e| GrmError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf().map_err(|e| GrmError::io(path, e))?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

fn parse_f64(path: &Path, line_num: usize, field: &str) -> Result<f64, GrmError> {
    field.parse().map_err(|_| {
        GrmError::format(path, format!("line {}: '{}' is not a number", line_num, field))
    })
}

fn parse_index(path: &Path, line_num: usize, field: &str) -> Result<usize, GrmError> {
    match field.parse::<usize>() {
        Ok(v) if v >= 1 => Ok(v - 1),
        _ => Err(GrmError::format(
            path,
            format!("line {}: '{}' is not a 1-based index", line_num, field),
        )),
    }
}

fn parse_count(path: &Path, line_num: usize, field: &str) -> Result<u32, GrmError> {
    let c = parse_f64(path, line_num, field)?;
    if c < 0.0 || c.fract() != 0.0 || c > u32::MAX as f64 {
        return Err(GrmError::format(
            path,
            format!("line {}: '{}' is not a variant count", line_num, field),
        ));
    }
    Ok(c as u32)
}

/// Parse `.rel` text. The matrix size is the number of lines; line i
/// must hold exactly i fields.
pub fn parse_rel<R: BufRead>(reader: R, path: &Path) -> Result<PackedSymmetric<f64>, GrmError> {
    let mut data = Vec::new();
    let mut n = 0;
    for line in reader.lines() {
        let line = line.map_err(|e| GrmError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let before = data.len();
        for field in line.split_whitespace() {
            data.push(parse_f64(path, n + 1, field)?);
        }
        let got = data.len() - before;
        if got != n + 1 {
            return Err(GrmError::format(
                path,
                format!("line {}: expected {} fields, got {}", n + 1, n + 1, got),
            ));
        }
        n += 1;
    }
    PackedSymmetric::from_packed(n, data).map_err(|e| GrmError::from_linalg(path, e))
}

/// Read a `.rel` file.
pub fn read_rel(path: &Path) -> Result<PackedSymmetric<f64>, GrmError> {
    parse_rel(open_text(path)?, path)
}

/// Parse GCTA text. Lines must be in canonical pair order and the line
/// count must be n(n+1)/2.
pub fn parse_gcta_grm<R: BufRead>(
    reader: R,
    path: &Path,
) -> Result<(PackedSymmetric<f64>, PackedSymmetric<u32>), GrmError> {
    let mut values = Vec::new();
    let mut counts = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| GrmError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let line_num = values.len() + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(GrmError::format(
                path,
                format!("line {}: expected 4 fields, got {}", line_num, fields.len()),
            ));
        }
        let i = parse_index(path, line_num, fields[0])?;
        let j = parse_index(path, line_num, fields[1])?;
        let expected = pair_from_index(values.len());
        if (i, j) != expected {
            return Err(GrmError::format(
                path,
                format!(
                    "line {}: pair ({}, {}) out of order, expected ({}, {})",
                    line_num,
                    i + 1,
                    j + 1,
                    expected.0 + 1,
                    expected.1 + 1
                ),
            ));
        }
        counts.push(parse_count(path, line_num, fields[2])?);
        values.push(parse_f64(path, line_num, fields[3])?);
    }

    let n = triangular_dim(values.len()).map_err(|e| GrmError::from_linalg(path, e))?;
    let values =
        PackedSymmetric::from_packed(n, values).map_err(|e| GrmError::from_linalg(path, e))?;
    let counts =
        PackedSymmetric::from_packed(n, counts).map_err(|e| GrmError::from_linalg(path, e))?;
    Ok((values, counts))
}

/// Read a GCTA text GRM (`.grm` or `.grm.gz`).
pub fn read_gcta_grm(
    path: &Path,
) -> Result<(PackedSymmetric<f64>, PackedSymmetric<u32>), GrmError> {
    parse_gcta_grm(open_text(path)?, path)
}

/// Decode packed little-endian f32 entries for an n x n lower triangle.
/// The byte length must be exactly 4 * n(n+1)/2.
pub fn decode_f32_le(bytes: &[u8], n: usize, path: &Path) -> Result<Vec<f32>, GrmError> {
    let expected = BYTES_PER_ENTRY * packed_len(n);
    if bytes.len() != expected {
        return Err(GrmError::format(
            path,
            format!(
                "expected {} bytes for {} samples ({} pairs), got {}",
                expected,
                n,
                packed_len(n),
                bytes.len()
            ),
        ));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_ENTRY)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_f32_file(path: &Path, n: usize) -> Result<Vec<f32>, GrmError> {
    let file = File::open(path).map_err(|e| GrmError::io(path, e))?;
    let len = file.metadata().map_err(|e| GrmError::io(path, e))?.len();
    if len == 0 {
        return decode_f32_le(&[], n, path);
    }
    // SAFETY: the file is opened read-only and not modified while mapped.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| GrmError::io(path, e))?;
    decode_f32_le(&mmap, n, path)
}

/// Read `.grm.bin` values for n samples (n comes from the ID file).
pub fn read_gcta_grm_bin(path: &Path, n: usize) -> Result<PackedSymmetric<f64>, GrmError> {
    let entries = read_f32_file(path, n)?;
    PackedSymmetric::from_packed(n, entries.into_iter().map(f64::from).collect())
        .map_err(|e| GrmError::from_linalg(path, e))
}

/// Read `.grm.N.bin` variant counts for n samples.
pub fn read_gcta_grm_n_bin(path: &Path, n: usize) -> Result<PackedSymmetric<u32>, GrmError> {
    let entries = read_f32_file(path, n)?;
    let mut counts = Vec::with_capacity(entries.len());
    for (idx, c) in entries.into_iter().enumerate() {
        if !(c >= 0.0 && c.fract() == 0.0) {
            let (i, j) = pair_from_index(idx);
            return Err(GrmError::format(
                path,
                format!("pair ({}, {}): {} is not a variant count", i + 1, j + 1, c),
            ));
        }
        counts.push(c as u32);
    }
    PackedSymmetric::from_packed(n, counts).map_err(|e| GrmError::from_linalg(path, e))
}

/// Parse a two-column ID file. A family ID equal to the sample ID is
/// read back as "no family".
pub fn parse_id_file<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Sample>, GrmError> {
    let mut samples = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| GrmError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [fid, iid] if fid == iid => samples.push(Sample::new(*iid)),
            [fid, iid] => samples.push(Sample::with_family(*fid, *iid)),
            _ => {
                return Err(GrmError::format(
                    path,
                    format!("line {}: expected 2 fields, got {}", line_num + 1, fields.len()),
                ))
            }
        }
    }
    Ok(samples)
}

/// Read a `.rel.id` / `.grm.id` file.
pub fn read_id_file(path: &Path) -> Result<Vec<Sample>, GrmError> {
    parse_id_file(open_text(path)?, path)
}
