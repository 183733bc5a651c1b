use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A submission needs at least a signal file and its header.
pub const MIN_FILES: usize = 2;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Please select .dat + .hea files (got {selected}, need at least {min}).", min = MIN_FILES)]
    TooFewFiles { selected: usize },
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },
}

/// Role of a selected file within a WFDB record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFileKind {
    Signal,
    Header,
    Annotation,
    Other,
}

impl RecordFileKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        match ext.as_deref() {
            Some("dat") => RecordFileKind::Signal,
            Some("hea") => RecordFileKind::Header,
            Some("atr") | Some("qrs") => RecordFileKind::Annotation,
            _ => RecordFileKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    /// File name sent as the multipart part's filename.
    pub name: String,
    pub size: u64,
    pub kind: RecordFileKind,
}

/// Ordered, validated set of files for one submission.
#[derive(Debug, Clone)]
pub struct RecordSelection {
    files: Vec<SelectedFile>,
}

impl RecordSelection {
    /// Validate the user's selection. The count is checked before touching the
    /// filesystem.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self, ValidationError> {
        if paths.len() < MIN_FILES {
            return Err(ValidationError::TooFewFiles {
                selected: paths.len(),
            });
        }
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let meta = fs::metadata(path).map_err(|source| ValidationError::Unreadable {
                path: path.clone(),
                source,
            })?;
            if !meta.is_file() {
                return Err(ValidationError::Unreadable {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                });
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".into());
            files.push(SelectedFile {
                path: path.clone(),
                name,
                size: meta.len(),
                kind: RecordFileKind::from_path(path),
            });
        }
        Ok(Self { files })
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn first_of(&self, kind: RecordFileKind) -> Option<&SelectedFile> {
        self.files.iter().find(|f| f.kind == kind)
    }

    /// True when both a `.dat` and a `.hea` file were selected.
    pub fn has_signal_pair(&self) -> bool {
        self.first_of(RecordFileKind::Signal).is_some()
            && self.first_of(RecordFileKind::Header).is_some()
    }

    /// Record name taken from the first signal file's stem.
    pub fn record_name(&self) -> Option<String> {
        self.first_of(RecordFileKind::Signal)
            .and_then(|f| f.path.file_stem())
            .map(|s| s.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_fewer_than_two_files_without_io() {
        let none = RecordSelection::from_paths(&[]);
        assert!(matches!(
            none,
            Err(ValidationError::TooFewFiles { selected: 0 })
        ));
        // path does not exist; the count check fires first
        let one = RecordSelection::from_paths(&[PathBuf::from("/nonexistent/100.dat")]);
        assert!(matches!(one, Err(ValidationError::TooFewFiles { selected: 1 })));
    }

    #[test]
    fn classifies_selected_files() {
        let dir = tempdir().unwrap();
        let dat = dir.path().join("100.dat");
        let hea = dir.path().join("100.HEA");
        let atr = dir.path().join("100.atr");
        fs::write(&dat, vec![0u8; 64]).unwrap();
        fs::write(&hea, "100 2 360 650000\n").unwrap();
        fs::write(&atr, [0u8, 0u8]).unwrap();

        let selection = RecordSelection::from_paths(&[dat.clone(), hea, atr]).unwrap();
        let kinds: Vec<_> = selection.files().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordFileKind::Signal,
                RecordFileKind::Header,
                RecordFileKind::Annotation
            ]
        );
        assert!(selection.has_signal_pair());
        assert_eq!(selection.record_name().as_deref(), Some("100"));
        assert_eq!(selection.total_bytes(), 64 + 17 + 2);
        assert_eq!(selection.files()[0].name, "100.dat");
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let dat = dir.path().join("100.dat");
        fs::write(&dat, b"x").unwrap();
        let err = RecordSelection::from_paths(&[dat, dir.path().join("100.hea")]).unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }

    #[test]
    fn pair_detection_without_header() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.dat");
        let b = dir.path().join("b.csv");
        fs::write(&a, b"1").unwrap();
        fs::write(&b, b"2").unwrap();
        let selection = RecordSelection::from_paths(&[a, b]).unwrap();
        assert!(!selection.has_signal_pair());
        assert_eq!(selection.files()[1].kind, RecordFileKind::Other);
    }
}
