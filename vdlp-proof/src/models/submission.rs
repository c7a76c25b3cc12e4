//! Submission resolution
//!
//! Unpacks any zip archives in the input directory, then locates the audio
//! file and the contributor identity there. The identity comes from the
//! first JSON record in the directory that names one (`wallet_address`,
//! `email`, `user.wallet_address`, `user.email`), falling back to the
//! configured identity.

use crate::utils::extract_archives;
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use vdlp_common::{Error, Result};

/// JSON pointers tried in order on each identity record
const IDENTITY_POINTERS: [&str; 4] = [
    "/wallet_address",
    "/email",
    "/user/wallet_address",
    "/user/email",
];

/// One resolved submission
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub submission_id: Uuid,
    pub audio_path: PathBuf,
    pub identity: String,
}

impl Submission {
    pub fn new(audio_path: impl Into<PathBuf>, identity: impl Into<String>) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            audio_path: audio_path.into(),
            identity: identity.into(),
        }
    }

    /// Resolve a submission from `input_dir`
    ///
    /// Fails with `InputMissing` when the directory, the audio file or the
    /// identity cannot be found, or when an archive cannot be unpacked.
    pub fn resolve(
        input_dir: &Path,
        audio_extensions: &[String],
        fallback_identity: Option<&str>,
    ) -> Result<Self> {
        let mut files = list_files(input_dir)?;
        if extract_archives(input_dir)? > 0 {
            files = list_files(input_dir)?;
        }

        let audio_path = files
            .iter()
            .find(|p| has_extension(p, audio_extensions))
            .cloned()
            .ok_or_else(|| {
                Error::InputMissing(format!(
                    "no audio file ({}) in {}",
                    audio_extensions.join(", "),
                    input_dir.display()
                ))
            })?;

        let identity = files
            .iter()
            .filter(|p| has_extension(p, &["json".to_string()]))
            .find_map(|p| identity_from_record(p))
            .or_else(|| {
                fallback_identity
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                Error::InputMissing(format!("no contributor identity for {}", input_dir.display()))
            })?;

        let submission = Self::new(audio_path, identity);
        tracing::info!(
            submission_id = %submission.submission_id,
            audio = %submission.audio_path.display(),
            identity = %submission.identity,
            "Submission resolved"
        );
        Ok(submission)
    }
}

/// Regular files of `dir`, sorted by name
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::InputMissing(format!("cannot read input directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Identity named by a JSON record; unreadable records are skipped
fn identity_from_record(path: &Path) -> Option<String> {
    let value: Value = match std::fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(Error::from))
    {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable identity record");
            return None;
        }
    };

    IDENTITY_POINTERS
        .iter()
        .filter_map(|ptr| value.pointer(ptr).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["ogg".to_string(), "wav".to_string()]
    }

    fn touch(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_resolves_audio_and_json_identity() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt", "");
        touch(dir.path(), "voice.OGG", "");
        touch(dir.path(), "user.json", r#"{"user": {"email": "a@example.com"}}"#);

        let sub = Submission::resolve(dir.path(), &exts(), Some("fallback")).unwrap();
        assert_eq!(sub.audio_path, dir.path().join("voice.OGG"));
        assert_eq!(sub.identity, "a@example.com");
    }

    #[test]
    fn test_wallet_preferred_over_email() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.wav", "");
        touch(
            dir.path(),
            "profile.json",
            r#"{"email": "a@example.com", "wallet_address": "0xabc"}"#,
        );

        let sub = Submission::resolve(dir.path(), &exts(), None).unwrap();
        assert_eq!(sub.identity, "0xabc");
    }

    #[test]
    fn test_falls_back_to_configured_identity() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.wav", "");
        touch(dir.path(), "broken.json", "{not json");
        touch(dir.path(), "empty.json", r#"{"email": ""}"#);

        let sub = Submission::resolve(dir.path(), &exts(), Some("0xenv")).unwrap();
        assert_eq!(sub.identity, "0xenv");
    }

    #[test]
    fn test_resolves_from_zipped_upload() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let dir = TempDir::new().unwrap();
        let mut writer =
            zip::ZipWriter::new(std::fs::File::create(dir.path().join("upload.zip")).unwrap());
        writer.start_file("recording.ogg", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"OggS").unwrap();
        writer.start_file("account.json", SimpleFileOptions::default()).unwrap();
        writer
            .write_all(br#"{"user": {"wallet_address": "0xzipped"}}"#)
            .unwrap();
        writer.finish().unwrap();

        let sub = Submission::resolve(dir.path(), &exts(), Some("fallback")).unwrap();
        assert_eq!(sub.audio_path, dir.path().join("recording.ogg"));
        assert_eq!(sub.identity, "0xzipped");
    }

    #[test]
    fn test_missing_inputs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp3", "");
        let result = Submission::resolve(dir.path(), &exts(), Some("x"));
        assert!(matches!(result, Err(Error::InputMissing(_))));

        touch(dir.path(), "a.ogg", "");
        let result = Submission::resolve(dir.path(), &exts(), None);
        assert!(matches!(result, Err(Error::InputMissing(_))));

        let result = Submission::resolve(&dir.path().join("nope"), &exts(), Some("x"));
        assert!(matches!(result, Err(Error::InputMissing(_))));
    }
}
