//! Input resolution: validate source documents and expand input lists.
//!
//! We check the PDF magic bytes (`%PDF`) before handing a path to the
//! rendering engine so callers get a precise [`DocumentOpenError`] instead of
//! an opaque engine failure.

use crate::error::DocumentOpenError;
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_document(path: &Path) -> Result<(), DocumentOpenError> {
    let path_buf = path.to_path_buf();

    if !path.is_file() {
        return Err(DocumentOpenError::FileNotFound { path: path_buf });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => return Err(DocumentOpenError::NotAPdf { path: path_buf, magic }),
                Err(_) => {
                    return Err(DocumentOpenError::CorruptPdf {
                        path: path_buf,
                        detail: "file is shorter than a PDF header".into(),
                    })
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocumentOpenError::PermissionDenied { path: path_buf });
        }
        Err(_) => return Err(DocumentOpenError::FileNotFound { path: path_buf }),
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

/// Output path prefix for a document: `<output_dir>/<source stem>`.
pub fn output_base(output_dir: &Path, source: &Path) -> PathBuf {
    output_dir.join(stem_of(source))
}

/// Output path prefixes for a whole batch, one per input, never repeated.
///
/// Documents sharing a stem (`a/report.pdf`, `b/report.pdf`) would otherwise
/// overwrite each other's images. The first keeps its stem; later ones get
/// `_2`, `_3`, ... appended. Names are compared case-insensitively so the
/// result is also safe on case-insensitive file systems.
pub fn unique_output_bases(output_dir: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = stem_of(input);
            let mut name = stem.clone();
            let mut n = 1;
            while !taken.insert(name.to_string_lossy().to_lowercase()) {
                n += 1;
                name = stem.clone();
                name.push(format!("_{}", n));
            }
            output_dir.join(name)
        })
        .collect()
}

fn stem_of(source: &Path) -> OsString {
    source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Expand files and directories into a sorted, deduplicated list of PDFs.
///
/// Directories are searched recursively for `*.pdf` (any case). Explicit
/// file arguments are kept whatever their extension, so a misnamed PDF
/// still reaches validation and is reported there.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            // Symlinks are not followed, so a link cycle cannot repeat files.
            for entry in WalkDir::new(input)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                if is_pdf(entry.path()) {
                    found.insert(entry.into_path());
                }
            }
        } else {
            found.insert(input.clone());
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_document(Path::new("/definitely/not/a/real/file.pdf")).unwrap_err();
        assert!(matches!(err, DocumentOpenError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        fs::write(&path, b"PK\x03\x04 not a pdf").unwrap();
        match validate_document(&path).unwrap_err() {
            DocumentOpenError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            validate_document(&path).unwrap_err(),
            DocumentOpenError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn pdf_header_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert!(validate_document(&path).is_ok());
    }

    #[test]
    fn output_base_uses_stem() {
        assert_eq!(
            output_base(Path::new("/out"), Path::new("/in/annual.report.pdf")),
            PathBuf::from("/out/annual.report")
        );
    }

    #[test]
    fn collect_walks_directories_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(nested.join("a.PDF"), b"%PDF").unwrap();
        fs::write(nested.join("notes.txt"), b"hi").unwrap();

        let explicit = dir.path().join("b.pdf");
        let found = collect_inputs(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(found.len(), 2);
        assert!(found.contains(&explicit));
        assert!(found.contains(&nested.join("a.PDF")));
    }

    #[test]
    fn same_stem_in_different_folders_gets_distinct_bases() {
        let inputs = vec![
            PathBuf::from("/in/a/report.pdf"),
            PathBuf::from("/in/b/report.pdf"),
            PathBuf::from("/in/c/Report.PDF"),
            PathBuf::from("/in/report_2.pdf"),
            PathBuf::from("/in/summary.pdf"),
        ];
        let bases = unique_output_bases(Path::new("/out"), &inputs);
        assert_eq!(
            bases,
            vec![
                PathBuf::from("/out/report"),
                PathBuf::from("/out/report_2"),
                PathBuf::from("/out/Report_3"),
                PathBuf::from("/out/report_2_2"),
                PathBuf::from("/out/summary"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_does_not_repeat_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        fs::create_dir(&inner).unwrap();
        fs::write(inner.join("paper.pdf"), b"%PDF").unwrap();
        std::os::unix::fs::symlink(dir.path(), inner.join("loop")).unwrap();

        let found = collect_inputs(&[dir.path().to_path_buf()]);

        assert_eq!(found, vec![inner.join("paper.pdf")]);
    }
}
