//! Input resolution: validate the source deck and prepare the output copy.
//!
//! The input file is never modified. Every edit happens on a copy written to
//! the output path before the first slide is touched, so an interrupted run
//! leaves the original intact and the copy holding whatever slides were
//! already illustrated.

use crate::error::GeneratorError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Local file header signature every zip package starts with.
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Validate that `path` exists, is readable, and looks like a zip package.
pub fn resolve_input(path: &Path) -> Result<PathBuf, GeneratorError> {
    if !path.is_file() {
        return Err(GeneratorError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let n = f.read(&mut magic).unwrap_or(0);
            if n < magic.len() || magic != ZIP_MAGIC {
                return Err(GeneratorError::NotAPresentation {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(GeneratorError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(GeneratorError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved input deck: {}", path.display());
    Ok(path.to_path_buf())
}

/// `talk.pptx` + `_with_images` → `talk_with_images.pptx`, next to the input.
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation".to_string());
    input.with_file_name(format!("{stem}{suffix}.pptx"))
}

/// Copy the input deck to `output`, creating parent directories.
///
/// Rejects an output path that refers to the input file itself.
pub async fn copy_to_output(input: &Path, output: &Path) -> Result<(), GeneratorError> {
    if same_file(input, output) {
        return Err(GeneratorError::InvalidConfig(format!(
            "output path '{}' is the input file; choose a different output",
            output.display()
        )));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GeneratorError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
    }

    tokio::fs::copy(input, output)
        .await
        .map_err(|e| GeneratorError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;

    info!("Copied {} → {}", input.display(), output.display());
    Ok(())
}

/// Compare two paths after resolving symlinks and `..`; a missing output is
/// resolved through its parent directory.
fn same_file(input: &Path, output: &Path) -> bool {
    let Ok(input) = input.canonicalize() else {
        return false;
    };
    if let Ok(output) = output.canonicalize() {
        return input == output;
    }
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    match (parent.canonicalize(), output.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name) == input,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input(Path::new("/definitely/not/here.pptx")).unwrap_err();
        assert!(matches!(err, GeneratorError::FileNotFound { .. }));
    }

    #[test]
    fn non_zip_is_rejected_with_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "fake.pptx", b"%PDF-1.7");
        match resolve_input(&path).unwrap_err() {
            GeneratorError::NotAPresentation { magic, .. } => assert_eq!(&magic, b"%PDF"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tiny.pptx", b"PK");
        assert!(matches!(
            resolve_input(&path),
            Err(GeneratorError::NotAPresentation { .. })
        ));
    }

    #[test]
    fn zip_header_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deck.pptx", b"PK\x03\x04rest");
        assert_eq!(resolve_input(&path).unwrap(), path);
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/decks/messe.pptx"), "_with_images"),
            PathBuf::from("/decks/messe_with_images.pptx")
        );
        assert_eq!(
            default_output_path(Path::new("talk.PPTX"), "-art"),
            PathBuf::from("talk-art.pptx")
        );
    }

    #[tokio::test]
    async fn copy_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "deck.pptx", b"PK\x03\x04data");
        let output = dir.path().join("out/nested/deck.pptx");
        copy_to_output(&input, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"PK\x03\x04data");
    }

    #[tokio::test]
    async fn copy_onto_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "deck.pptx", b"PK\x03\x04data");
        let same = dir.path().join(".").join("deck.pptx");
        let err = copy_to_output(&input, &same).await.unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidConfig(_)));
        assert_eq!(std::fs::read(&input).unwrap(), b"PK\x03\x04data");
    }
}
