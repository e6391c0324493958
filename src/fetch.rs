//! Fetches one generated image and saves it under a name nobody else has.

use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tracing::{debug, warn};

use crate::constants::{PARTIAL_FILE_PREFIX, PARTIAL_FILE_SUFFIX};
use crate::error::{ConfigError, FetchPersistError};

#[allow(clippy::expect_used)] // literal pattern
static FILENAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="([^"]+)""#).expect("filename pattern compiles"));

/// HTTP client options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientSettings {
    /// Upper bound on a single request, including reading the body
    pub timeout: Duration,
    /// Accept any TLS certificate. Off unless asked for.
    pub accept_invalid_certs: bool,
}

/// Builds the HTTP client shared by a batch.
pub fn build_client(settings: &ClientSettings) -> Result<reqwest::Client, ConfigError> {
    if settings.accept_invalid_certs {
        warn!("TLS certificate verification is disabled for this batch");
    }
    #[allow(deprecated)]
    let builder = reqwest::Client::builder()
        .timeout(settings.timeout)
        .danger_accept_invalid_certs(settings.accept_invalid_certs);
    builder.build().map_err(ConfigError::Client)
}

/// Pulls the suggested filename out of the response's content-disposition.
///
/// Only the final path component of the hint is kept.
pub fn filename_hint(headers: &HeaderMap) -> Result<String, FetchPersistError> {
    let value = headers
        .get(CONTENT_DISPOSITION)
        .ok_or_else(|| FetchPersistError::Protocol("missing content-disposition".to_string()))?
        .to_str()
        .map_err(|err| {
            FetchPersistError::Protocol(format!("unreadable content-disposition: {err}"))
        })?;
    let captured = FILENAME_PATTERN
        .captures(value)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| {
            FetchPersistError::Protocol(format!("no filename in content-disposition {value:?}"))
        })?
        .as_str();

    Path::new(captured)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| FetchPersistError::Protocol(format!("unusable filename {captured:?}")))
}

/// Splits a filename at its first `.` into stem and extension.
pub fn split_filename(name: &str) -> (&str, Option<&str>) {
    match name.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    }
}

fn indexed_name(stem: &str, ext: Option<&str>, index: usize) -> String {
    match ext {
        Some(ext) => format!("{stem} [{index}].{ext}"),
        None => format!("{stem} [{index}]"),
    }
}

/// True if anything, even a dangling symlink, sits at `path`.
fn is_taken(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// `hint` itself, then `stem [0].ext`, `stem [1].ext` and so on.
fn candidates<'a>(dir: &'a Path, hint: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = split_filename(hint);
    std::iter::once(dir.join(hint))
        .chain((0..).map(move |index| dir.join(indexed_name(stem, ext, index))))
}

/// First unused path for `hint` in `dir`: the hint itself, then
/// `stem [0].ext`, `stem [1].ext` and so on.
///
/// This only checks, it doesn't reserve; see [`persist`].
pub fn resolve_unique_path(dir: &Path, hint: &str) -> PathBuf {
    candidates(dir, hint)
        .find(|candidate| !is_taken(candidate.as_path()))
        .unwrap_or_else(|| dir.join(hint))
}

/// Writes `body` into `dir` under a unique name derived from `hint`.
///
/// The body goes to a scratch file first and is moved into place without
/// overwriting, so a final name is never seen half-written and a name taken
/// in the meantime just moves on to the next index.
pub fn persist(dir: &Path, hint: &str, body: &[u8]) -> Result<PathBuf, FetchPersistError> {
    persist_with(dir, hint, body, is_taken)
}

fn persist_with(
    dir: &Path,
    hint: &str,
    body: &[u8],
    is_taken: impl Fn(&Path) -> bool,
) -> Result<PathBuf, FetchPersistError> {
    let mut file = tempfile::Builder::new()
        .prefix(PARTIAL_FILE_PREFIX)
        .suffix(PARTIAL_FILE_SUFFIX)
        .tempfile_in(dir)
        .map_err(|source| FetchPersistError::Filesystem {
            path: dir.to_path_buf(),
            source,
        })?;
    file.write_all(body)
        .and_then(|()| file.flush())
        .map_err(|source| FetchPersistError::Filesystem {
            path: file.path().to_path_buf(),
            source,
        })?;
    // scratch files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|source| FetchPersistError::Filesystem {
                path: file.path().to_path_buf(),
                source,
            })?;
    }

    // every attempt moves to a later candidate, never back to one that collided
    for path in candidates(dir, hint).filter(|candidate| !is_taken(candidate.as_path())) {
        match file.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                debug!("{} was taken while saving, trying the next name", path.display());
                file = err.file;
            }
            Err(err) => {
                return Err(FetchPersistError::Filesystem {
                    path,
                    source: err.error,
                });
            }
        }
    }
    Err(FetchPersistError::Filesystem {
        path: dir.join(hint),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    })
}

/// Runs `fetcher` once and saves the response body into `dir`.
///
/// Returns the path written. On error nothing is left in `dir`.
pub async fn fetch_one<F, Fut>(fetcher: F, dir: &Path) -> Result<PathBuf, FetchPersistError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let response = fetcher().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchPersistError::Status(status));
    }
    let hint = filename_hint(response.headers())?;
    let body = response.bytes().await?;
    let path = persist(dir, &hint, &body)?;
    debug!("Saved {} ({} bytes)", path.display(), body.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(disposition: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_str(disposition).unwrap(),
        );
        headers
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn hint_is_read_from_disposition() {
        let hint = filename_hint(&headers(r#"attachment; filename="castle 1.webp""#)).unwrap();
        assert_eq!(hint, "castle 1.webp");
    }

    #[test]
    fn hint_is_reduced_to_a_file_name() {
        let hint = filename_hint(&headers(r#"attachment; filename="../../etc/x.webp""#)).unwrap();
        assert_eq!(hint, "x.webp");
        assert!(filename_hint(&headers(r#"attachment; filename="..""#)).is_err());
    }

    #[test]
    fn missing_or_malformed_disposition_is_a_protocol_error() {
        let err = filename_hint(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.kind(), "ProtocolError");
        let err = filename_hint(&headers("attachment; filename=image.webp")).unwrap_err();
        assert_eq!(err.kind(), "ProtocolError");
        let err = filename_hint(&headers("inline")).unwrap_err();
        assert_eq!(err.kind(), "ProtocolError");
    }

    #[test]
    fn split_at_first_dot() {
        assert_eq!(split_filename("image.webp"), ("image", Some("webp")));
        assert_eq!(split_filename("a.b.webp"), ("a", Some("b.webp")));
        assert_eq!(split_filename("image"), ("image", None));
    }

    #[test]
    fn resolve_picks_smallest_free_index() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_unique_path(dir.path(), "image.webp"),
            dir.path().join("image.webp")
        );

        std::fs::write(dir.path().join("image.webp"), b"0").unwrap();
        assert_eq!(
            resolve_unique_path(dir.path(), "image.webp"),
            dir.path().join("image [0].webp")
        );

        std::fs::write(dir.path().join("image [0].webp"), b"1").unwrap();
        assert_eq!(
            resolve_unique_path(dir.path(), "image.webp"),
            dir.path().join("image [1].webp")
        );

        std::fs::write(dir.path().join("image [2].webp"), b"3").unwrap();
        assert_eq!(
            resolve_unique_path(dir.path(), "image.webp"),
            dir.path().join("image [1].webp")
        );
    }

    #[test]
    fn resolve_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image"), b"0").unwrap();
        assert_eq!(
            resolve_unique_path(dir.path(), "image"),
            dir.path().join("image [0]")
        );
    }

    #[test]
    fn persist_writes_one_file_and_no_scratch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.webp"), b"old").unwrap();

        let path = persist(dir.path(), "image.webp", b"new image").unwrap();

        assert_eq!(path, dir.path().join("image [0].webp"));
        assert_eq!(std::fs::read(&path).unwrap(), b"new image");
        assert_eq!(std::fs::read(dir.path().join("image.webp")).unwrap(), b"old");
        assert_eq!(file_names(dir.path()), vec!["image [0].webp", "image.webp"]);
    }

    #[test]
    fn name_taken_between_check_and_rename_moves_to_the_next_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.webp"), b"first").unwrap();
        std::fs::write(dir.path().join("image [0].webp"), b"second").unwrap();

        // every name looks free, so both existing files collide on rename
        let path = persist_with(dir.path(), "image.webp", b"third", |_| false).unwrap();

        assert_eq!(path, dir.path().join("image [1].webp"));
        assert_eq!(std::fs::read(&path).unwrap(), b"third");
        assert_eq!(std::fs::read(dir.path().join("image.webp")).unwrap(), b"first");
        assert_eq!(
            file_names(dir.path()),
            vec!["image [0].webp", "image [1].webp", "image.webp"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_count_as_taken() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        std::os::unix::fs::symlink(&missing, dir.path().join("image.webp")).unwrap();

        assert_eq!(
            resolve_unique_path(dir.path(), "image.webp"),
            dir.path().join("image [0].webp")
        );
        let path = persist(dir.path(), "image.webp", b"data").unwrap();
        assert_eq!(path, dir.path().join("image [0].webp"));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        assert_eq!(file_names(dir.path()), vec!["image [0].webp", "image.webp"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_at_an_indexed_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.webp"), b"old").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("image [0].webp"))
            .unwrap();

        let path = persist(dir.path(), "image.webp", b"new").unwrap();

        assert_eq!(path, dir.path().join("image [1].webp"));
        assert_eq!(
            file_names(dir.path()),
            vec!["image [0].webp", "image [1].webp", "image.webp"]
        );
    }

    #[test]
    fn persist_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = persist(&missing, "image.webp", b"data").unwrap_err();
        assert_eq!(err.kind(), "FilesystemError");
        assert!(file_names(dir.path()).is_empty());
    }

    #[test]
    fn client_builds_with_and_without_verification() {
        for accept_invalid_certs in [false, true] {
            let settings = ClientSettings {
                timeout: Duration::from_secs(5),
                accept_invalid_certs,
            };
            assert!(build_client(&settings).is_ok());
        }
    }
}
