//! Output persistence: timestamp-named files under the output directory.
//!
//! Every artifact (rendered Markdown, normalised image) is named after the
//! wall-clock second it was produced, `YYYY-MM-DD-HH-MM-SS.<ext>`. Two
//! sessions finishing in the same second would collide; the
//! [`CollisionPolicy`] decides whether the second one gets a `-N` suffix or
//! replaces the first.

use crate::config::CollisionPolicy;
use crate::error::Flyer2MdError;
use chrono::{DateTime, Local};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Upper bound on `-N` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 10_000;

/// File stem for a timestamp at second granularity.
pub fn timestamp_stem(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Create `dir` (and parents) if missing.
pub async fn ensure_dir(dir: &Path) -> Result<(), Flyer2MdError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Flyer2MdError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Pick the output path for `stem.ext` inside `dir`.
///
/// With [`CollisionPolicy::Suffix`] the chosen name is claimed by creating an
/// empty file with `create_new`, so concurrent sessions can never be handed
/// the same path. With [`CollisionPolicy::Overwrite`] the plain name is
/// returned as-is.
pub async fn reserve_path(
    dir: &Path,
    stem: &str,
    ext: &str,
    policy: CollisionPolicy,
) -> Result<PathBuf, Flyer2MdError> {
    ensure_dir(dir).await?;

    let plain = dir.join(format!("{stem}.{ext}"));
    if policy == CollisionPolicy::Overwrite {
        return Ok(plain);
    }

    for n in 0..MAX_SUFFIX {
        let candidate = if n == 0 {
            plain.clone()
        } else {
            dir.join(format!("{stem}-{n}.{ext}"))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => {
                debug!("Reserved output path {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(Flyer2MdError::OutputWriteFailed {
                    path: candidate,
                    source: e,
                })
            }
        }
    }

    Err(Flyer2MdError::OutputWriteFailed {
        path: plain,
        source: std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name after {MAX_SUFFIX} suffixes"),
        ),
    })
}

/// Write `contents` to a fresh timestamp-named file and return its path.
///
/// The bytes go to a `.tmp` sibling first and are renamed into place, so a
/// failed write never leaves a truncated document behind.
pub async fn write_timestamped(
    dir: &Path,
    stem: &str,
    ext: &str,
    contents: &str,
    policy: CollisionPolicy,
) -> Result<PathBuf, Flyer2MdError> {
    let path = reserve_path(dir, stem, ext, policy).await?;

    // Each write stages into its own temp file in the target directory, so
    // concurrent writers to the same name never share a staging path.
    let staging_dir = path.parent().unwrap_or(dir).to_path_buf();
    let target = path.clone();
    let bytes = contents.as_bytes().to_vec();
    let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut staged = NamedTempFile::new_in(&staging_dir)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Flyer2MdError::Internal(format!("output write task failed: {e}")))?;

    if let Err(e) = written {
        // The temp file is removed on drop; release the reservation too.
        if policy == CollisionPolicy::Suffix {
            let _ = tokio::fs::remove_file(&path).await;
        }
        return Err(Flyer2MdError::OutputWriteFailed { path, source: e });
    }

    debug!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stem_has_second_granularity() {
        let t = Local.with_ymd_and_hms(2024, 5, 1, 14, 3, 9).unwrap();
        assert_eq!(timestamp_stem(t), "2024-05-01-14-03-09");
    }

    #[tokio::test]
    async fn creates_missing_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/output");
        let path = write_timestamped(&dir, "s", "md", "hello", CollisionPolicy::Suffix)
            .await
            .unwrap();
        assert_eq!(path, dir.join("s.md"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn suffix_policy_never_clobbers() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_timestamped(tmp.path(), "s", "md", "one", CollisionPolicy::Suffix)
            .await
            .unwrap();
        let b = write_timestamped(tmp.path(), "s", "md", "two", CollisionPolicy::Suffix)
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(b, tmp.path().join("s-1.md"));
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "two");
    }

    #[tokio::test]
    async fn overwrite_policy_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_timestamped(tmp.path(), "s", "md", "one", CollisionPolicy::Overwrite)
            .await
            .unwrap();
        let b = write_timestamped(tmp.path(), "s", "md", "two", CollisionPolicy::Overwrite)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "two");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn concurrent_reservations_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let dir = dir.clone();
                tokio::spawn(async move {
                    reserve_path(&dir, "s", "md", CollisionPolicy::Suffix)
                        .await
                        .unwrap()
                })
            })
            .collect();
        let mut paths = Vec::new();
        for t in tasks {
            paths.push(t.await.unwrap());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_overwrites_all_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        for round in 0..20 {
            let tasks: Vec<_> = (0..4)
                .map(|writer| {
                    let dir = dir.clone();
                    tokio::spawn(async move {
                        let body = format!("round {round} writer {writer}");
                        write_timestamped(&dir, "s", "md", &body, CollisionPolicy::Overwrite).await
                    })
                })
                .collect();
            for t in tasks {
                t.await.unwrap().expect("every overwrite should land");
            }

            let body = std::fs::read_to_string(dir.join("s.md")).unwrap();
            assert!(body.starts_with(&format!("round {round} writer ")), "{body}");
        }

        // Only the final document remains; no staging files leak.
        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("s.md")]);
    }
}
