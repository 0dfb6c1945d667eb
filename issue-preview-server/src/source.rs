//! Reading the source document with retry.

use std::io::ErrorKind;
use std::path::Path;

use thiserror::Error;

use crate::config::ReadPolicy;

/// Why the source could not be read after the retry budget was spent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadFailure {
    #[error("source file not found (tried {attempts} times)")]
    Missing { attempts: u32 },

    #[error("source file is empty (tried {attempts} times)")]
    Empty { attempts: u32 },

    #[error("could not read source file: {message}")]
    Io { message: String },
}

/// Read `path`, retrying while it is absent or empty.
///
/// Other I/O errors (permissions, path is a directory) are not retried.
pub async fn read_with_retry(path: &Path, policy: &ReadPolicy) -> Result<Vec<u8>, ReadFailure> {
    let attempts = policy.attempts.max(1);
    let mut last = ReadFailure::Missing { attempts };

    for attempt in 1..=attempts {
        match tokio::fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => return Ok(bytes),
            Ok(_) => last = ReadFailure::Empty { attempts },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                last = ReadFailure::Missing { attempts }
            }
            Err(err) => {
                return Err(ReadFailure::Io {
                    message: err.to_string(),
                })
            }
        }
        if attempt < attempts {
            tracing::debug!(path = %path.display(), attempt, "source not ready, retrying");
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quick() -> ReadPolicy {
        ReadPolicy {
            attempts: 3,
            retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("form.yml");
        std::fs::write(&path, "name: x\n").unwrap();
        assert_eq!(read_with_retry(&path, &quick()).await.unwrap(), b"name: x\n");
    }

    #[tokio::test]
    async fn missing_file_exhausts_retries() {
        let dir = TempDir::new().unwrap();
        let err = read_with_retry(&dir.path().join("gone.yml"), &quick())
            .await
            .unwrap_err();
        assert_eq!(err, ReadFailure::Missing { attempts: 3 });
    }

    #[tokio::test]
    async fn empty_file_is_reported_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("form.yml");
        std::fs::write(&path, "").unwrap();
        let err = read_with_retry(&path, &quick()).await.unwrap_err();
        assert_eq!(err, ReadFailure::Empty { attempts: 3 });
    }

    #[tokio::test]
    async fn file_appearing_during_retry_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.yml");
        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                tokio::fs::write(&path, "name: late\n").await.unwrap();
            })
        };
        let policy = ReadPolicy {
            attempts: 50,
            retry_delay: Duration::from_millis(10),
        };
        let bytes = read_with_retry(&path, &policy).await.unwrap();
        assert_eq!(bytes, b"name: late\n");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn directory_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let err = read_with_retry(dir.path(), &quick()).await.unwrap_err();
        assert!(matches!(err, ReadFailure::Io { .. }), "got {err:?}");
    }
}
