//! Input file parsing: atom positions, tight-binding coefficients, and
//! legacy wavefunction cubes, plus the basename-based hole/electron
//! classification `coulombo.cpp`'s driver performs before building the
//! integral pattern.
//!
//! Ported from the file-reading halves of `FunctionCollection.cpp`'s
//! `loadFunctionFromFile`/constructor and the basename check inlined in
//! `coulombo.cpp`'s `main`.

use std::fs::File;
use std::io::{BufRead, BufReader, Read as _};
use std::path::Path;

use num_complex::Complex64;

use crate::error::{Error, Result};

/// Reads whitespace-separated `x y z` triples, one per line, stopping
/// silently at the first line that doesn't parse as three floats (but
/// not before at least one line has been read).
pub fn read_atom_positions(path: &Path) -> Result<Vec<[f64; 3]>> {
    let file = File::open(path)
        .map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);
    let mut coords = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            break;
        }
        let parsed: Option<Vec<f64>> = parts.iter().map(|p| p.parse::<f64>().ok()).collect();
        match parsed {
            Some(v) => coords.push([v[0], v[1], v[2]]),
            None => break,
        }
    }
    if coords.is_empty() {
        return Err(Error::input(format!(
            "{}: no atom coordinates could be read",
            path.display()
        )));
    }
    Ok(coords)
}

/// Reads a tight-binding coefficient file: `skip_lines` header lines,
/// then exactly `orbitals * atoms` lines of `re im`, orbital-fastest,
/// atom-slowest. Truncation (fewer data lines than expected, or a
/// malformed `re im` pair) is an `Error::Input`.
pub fn read_coefficients(
    path: &Path,
    orbitals: u32,
    atoms: u32,
    skip_lines: u32,
) -> Result<Vec<Complex64>> {
    let file = File::open(path)
        .map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    for _ in 0..skip_lines {
        lines
            .next()
            .ok_or_else(|| Error::input(format!("{}: file shorter than --skip-lines", path.display())))?
            .map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
    }

    let expected = orbitals as usize * atoms as usize;
    let mut out = Vec::with_capacity(expected);
    for line in lines {
        if out.len() == expected {
            break;
        }
        let line = line.map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(Error::input(format!(
                "{}: expected \"re im\" pairs, found \"{line}\"",
                path.display()
            )));
        }
        let re: f64 = parts[0]
            .parse()
            .map_err(|_| Error::input(format!("{}: malformed real part \"{}\"", path.display(), parts[0])))?;
        let im: f64 = parts[1]
            .parse()
            .map_err(|_| Error::input(format!("{}: malformed imaginary part \"{}\"", path.display(), parts[1])))?;
        out.push(Complex64::new(re, im));
    }
    if out.len() != expected {
        return Err(Error::input(format!(
            "{}: expected {expected} coefficient lines (orbitals={orbitals} x atoms={atoms}), found {}",
            path.display(),
            out.len()
        )));
    }
    Ok(out)
}

/// Reads a legacy binary wavefunction cube: a flat sequence of
/// little-endian `f64` pairs (re, im) in x-fastest, y, z order, sized
/// `2 * x * y * z` doubles. Real-only cubes (`x * y * z` doubles) are
/// accepted and widened to complex with a zero imaginary part, per
/// spec.md's "real cubes are widened to complex" note. No documented
/// header exists in the retrieved sources for this format; grounded on
/// the raw-double volumetric readers in `other_examples/`.
pub fn read_wavefunction_cube(path: &Path, total_cells: usize) -> Result<Vec<Complex64>> {
    let mut file = File::open(path).map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::input(format!("{}: {e}", path.display())))?;

    let complex_bytes = total_cells * 16;
    let real_bytes = total_cells * 8;

    if bytes.len() == complex_bytes {
        let mut out = Vec::with_capacity(total_cells);
        for chunk in bytes.chunks_exact(16) {
            let re = f64::from_le_bytes(chunk[0..8].try_into().unwrap());
            let im = f64::from_le_bytes(chunk[8..16].try_into().unwrap());
            out.push(Complex64::new(re, im));
        }
        Ok(out)
    } else if bytes.len() == real_bytes {
        let mut out = Vec::with_capacity(total_cells);
        for chunk in bytes.chunks_exact(8) {
            let re = f64::from_le_bytes(chunk.try_into().unwrap());
            out.push(Complex64::new(re, 0.0));
        }
        Ok(out)
    } else {
        Err(Error::input(format!(
            "{}: cube has {} bytes, expected {real_bytes} (real) or {complex_bytes} (complex) for {total_cells} cells",
            path.display(),
            bytes.len()
        )))
    }
}

/// A coefficient file's role, inferred from its basename's first
/// character ('h' = hole, 'e' = electron). Ported from the inline
/// check at the top of `coulombo.cpp`'s `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Hole,
    Electron,
}

/// Classifies one input path by its basename's first character.
pub fn classify_basename(path: &Path) -> Result<StateKind> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::input(format!("{}: not a valid file name", path.display())))?;
    match name.chars().next() {
        Some('h') => Ok(StateKind::Hole),
        Some('e') => Ok(StateKind::Electron),
        _ => Err(Error::config(format!(
            "{name}: basename must start with 'h' (hole state) or 'e' (electron state)"
        ))),
    }
}

/// Validates that every hole-classified path precedes every
/// electron-classified path in `kinds` (matching the positional
/// argument order), and returns the hole count. Ported from
/// `coulombo.cpp`'s ordering check ahead of `Pattern pattern(integrals,
/// hoStateCount)`.
pub fn validate_hole_electron_order(kinds: &[StateKind]) -> Result<u32> {
    let mut seen_electron = false;
    let mut hole_count = 0u32;
    for kind in kinds {
        match kind {
            StateKind::Hole => {
                if seen_electron {
                    return Err(Error::config(
                        "all hole-state files must precede all electron-state files",
                    ));
                }
                hole_count += 1;
            }
            StateKind::Electron => seen_electron = true,
        }
    }
    Ok(hole_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn atom_positions_stop_at_first_bad_line() {
        let f = write_temp("0.0 0.0 0.0\n1.0 0.0 0.0\ntrailer\n");
        let coords = read_atom_positions(f.path()).unwrap();
        assert_eq!(coords.len(), 2);
    }

    #[test]
    fn coefficients_reject_truncation() {
        let f = write_temp("1.0 0.0\n2.0 0.0\n");
        let err = read_coefficients(f.path(), 2, 2, 0);
        assert!(err.is_err());
    }

    #[test]
    fn coefficients_skip_header_lines() {
        let f = write_temp("# header\n1.0 0.0\n2.0 1.0\n");
        let data = read_coefficients(f.path(), 2, 1, 1).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], Complex64::new(1.0, 0.0));
        assert_eq!(data[1], Complex64::new(2.0, 1.0));
    }

    #[test]
    fn classify_basename_accepts_h_and_e() {
        assert_eq!(
            classify_basename(Path::new("h1.dat")).unwrap(),
            StateKind::Hole
        );
        assert_eq!(
            classify_basename(Path::new("/tmp/e2.dat")).unwrap(),
            StateKind::Electron
        );
        assert!(classify_basename(Path::new("x.dat")).is_err());
    }

    #[test]
    fn hole_electron_ordering_is_enforced() {
        use StateKind::*;
        assert_eq!(validate_hole_electron_order(&[Hole, Hole, Electron]).unwrap(), 2);
        assert!(validate_hole_electron_order(&[Hole, Electron, Hole]).is_err());
    }
}
