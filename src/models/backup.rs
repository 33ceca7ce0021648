use std::io;
use std::path::{Path, PathBuf};

use crate::client::{ApiResult, BackupAttributes, Client};

/// Local path for a file named by the server. Only the last component of
/// `filename` is used, so the result always stays inside `dir`.
pub fn download_path(dir: &Path, filename: &str) -> io::Result<PathBuf> {
    match Path::new(filename).file_name() {
        Some(name) => Ok(dir.join(name)),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid file name received from the server: '{filename}'"),
        )),
    }
}

/// A database backup belonging to a cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub code_name: String,
    pub filename: String,
    pub kind: String,
    pub human_size: String,
    pub size: u64,
    pub state: String,
}

impl Backup {
    pub fn new(code_name: &str, attributes: BackupAttributes) -> Self {
        Self {
            code_name: code_name.to_string(),
            filename: attributes.filename,
            kind: attributes.kind,
            human_size: attributes.human_size,
            size: attributes.size,
            state: attributes.state,
        }
    }

    /// Where `download` writes the archive inside `dir`.
    pub fn destination(&self, dir: &Path) -> io::Result<PathBuf> {
        download_path(dir, &self.filename)
    }

    /// Download into `dir` under the backup's filename.
    pub async fn download<F>(&self, client: &Client, dir: &Path, progress: F) -> ApiResult<u64>
    where
        F: FnMut(u64),
    {
        client
            .download_backup(
                &self.code_name,
                &self.filename,
                &self.destination(dir)?,
                progress,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use httpmock::prelude::*;
    use regex::Regex;
    use tempfile::TempDir;

    fn backup() -> Backup {
        Backup::new(
            "foo-staging",
            BackupAttributes {
                filename: "2013.05.01.postgres.tar.gz".to_string(),
                kind: "postgresql".to_string(),
                human_size: "10 KiB".to_string(),
                size: 10240,
                state: "completed".to_string(),
            },
        )
    }

    #[test]
    fn test_destination() {
        let dir = Path::new("/tmp/backups");
        assert_eq!(
            backup().destination(dir).unwrap(),
            PathBuf::from("/tmp/backups/2013.05.01.postgres.tar.gz")
        );
    }

    #[test]
    fn test_download_path_stays_inside_dir() {
        let dir = Path::new("/tmp/backups");
        assert_eq!(
            download_path(dir, "../evil").unwrap(),
            PathBuf::from("/tmp/backups/evil")
        );
        assert_eq!(
            download_path(dir, "/etc/passwd").unwrap(),
            PathBuf::from("/tmp/backups/passwd")
        );
        assert_eq!(
            download_path(dir, "nested/dir/dump.tar.gz").unwrap(),
            PathBuf::from("/tmp/backups/dump.tar.gz")
        );
    }

    #[test]
    fn test_download_path_without_file_name() {
        let dir = Path::new("/tmp/backups");
        for filename in ["", "..", "/", "backups/.."] {
            let err = download_path(dir, filename).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData, "{filename:?}");
        }
    }

    #[tokio::test]
    async fn test_download_ignores_directories_in_filename() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_matches(Regex::new("^/apps/foo-staging/database_backups/").unwrap());
                then.status(200).body("backup-bytes");
            })
            .await;

        let root = TempDir::new().unwrap();
        let dir = root.path().join("inner");
        std::fs::create_dir(&dir).unwrap();

        let mut backup = backup();
        backup.filename = "../evil.tar.gz".to_string();
        backup
            .download(&test_client(&server), &dir, |_| {})
            .await
            .unwrap();
        assert!(dir.join("evil.tar.gz").exists());
        assert!(!root.path().join("evil.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_download_reports_progress() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/database_backups/2013.05.01.postgres.tar.gz");
                then.status(200).body("backup-bytes");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let mut seen = 0u64;
        let written = backup()
            .download(&test_client(&server), dir.path(), |n| seen += n)
            .await
            .unwrap();
        assert_eq!(written, 12);
        assert_eq!(seen, 12);
        assert!(dir.path().join("2013.05.01.postgres.tar.gz").exists());
    }
}
