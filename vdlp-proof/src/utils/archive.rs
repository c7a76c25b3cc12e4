//! Zip intake for the input directory
//!
//! Submissions may arrive as zip archives. Every regular file in the input
//! directory that starts with a zip signature is unpacked in place before
//! the audio file and identity record are looked up.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use vdlp_common::{Error, Result};
use zip::ZipArchive;

/// Local file header, or end-of-central-directory for an empty archive
const ZIP_SIGNATURES: [[u8; 4]; 2] = [*b"PK\x03\x04", *b"PK\x05\x06"];

/// Extract every zip archive found directly in `dir` into `dir`.
/// Returns the number of archives extracted.
pub fn extract_archives(dir: &Path) -> Result<usize> {
    let mut extracted = 0;

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_zip(&path)? {
            continue;
        }

        let file = File::open(&path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            Error::InputMissing(format!("cannot read archive {}: {}", path.display(), e))
        })?;
        let entries = archive.len();

        // Entry names escaping `dir` are rejected by the zip crate
        archive.extract(dir).map_err(|e| {
            Error::InputMissing(format!("cannot extract archive {}: {}", path.display(), e))
        })?;

        tracing::info!(archive = %path.display(), entries, "Extracted input archive");
        extracted += 1;
    }

    Ok(extracted)
}

fn is_zip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(ZIP_SIGNATURES.contains(&magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extracts_archives_in_place() {
        let dir = TempDir::new().unwrap();
        write_zip(
            &dir.path().join("upload.zip"),
            &[("voice.ogg", b"OggS".as_slice()), ("user.json", b"{}".as_slice())],
        );
        std::fs::write(dir.path().join("notes.txt"), "plain").unwrap();

        assert_eq!(extract_archives(dir.path()).unwrap(), 1);
        assert_eq!(std::fs::read(dir.path().join("voice.ogg")).unwrap(), b"OggS");
        assert!(dir.path().join("user.json").is_file());
    }

    #[test]
    fn test_detects_archives_by_content() {
        let dir = TempDir::new().unwrap();
        // No .zip extension
        write_zip(&dir.path().join("payload"), &[("take.wav", b"RIFF".as_slice())]);
        std::fs::write(dir.path().join("short"), "PK").unwrap();

        assert_eq!(extract_archives(dir.path()).unwrap(), 1);
        assert!(dir.path().join("take.wav").is_file());
    }

    #[test]
    fn test_corrupt_archive_is_input_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.zip"), b"PK\x03\x04garbage").unwrap();

        let result = extract_archives(dir.path());
        assert!(matches!(result, Err(Error::InputMissing(_))));
    }
}
