use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{ApiResult, Client};

/// Downloads are allowed to run much longer than regular API calls.
pub(crate) const STREAM_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackupAttributes {
    pub filename: String,
    /// Database kind, e.g. `postgresql`.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub human_size: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub state: String,
}

#[derive(Serialize)]
struct BackupRequest<'a> {
    kind: &'a str,
}

#[derive(Serialize)]
struct RestoreRequest<'a> {
    filename: &'a str,
}

impl Client {
    pub async fn database_backups(&self, code_name: &str) -> ApiResult<Vec<BackupAttributes>> {
        self.get(&["apps", code_name, "database_backups"]).await
    }

    /// Fetch a single backup by filename, or `last` for the newest one.
    pub async fn database_backup(
        &self,
        code_name: &str,
        handler: &str,
    ) -> ApiResult<BackupAttributes> {
        self.get(&["apps", code_name, "database_backups", handler])
            .await
    }

    pub async fn request_backup(&self, code_name: &str, kind: &str) -> ApiResult<()> {
        self.post_unit(
            &["apps", code_name, "database_backups"],
            &BackupRequest { kind },
        )
        .await
    }

    pub async fn restore_backup(&self, code_name: &str, filename: &str) -> ApiResult<()> {
        self.put_unit(
            &["apps", code_name, "database_backups", "restore"],
            &RestoreRequest { filename },
        )
        .await
    }

    /// Stream a backup archive into `destination`, calling `progress` with
    /// the size of every chunk written. Returns the number of bytes written.
    pub async fn download_backup<F>(
        &self,
        code_name: &str,
        filename: &str,
        destination: &Path,
        mut progress: F,
    ) -> ApiResult<u64>
    where
        F: FnMut(u64),
    {
        let builder = self
            .request(Method::GET, &["apps", code_name, "database_backups", filename])?
            .header(ACCEPT, HeaderValue::from_static("application/octet-stream"))
            .timeout(STREAM_TIMEOUT);
        let response = self.execute(builder).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(chunk.len() as u64);
        }
        file.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use crate::client::ApiError;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_backups() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/apps/foo-staging/database_backups");
                then.status(200).json_body(json!([
                    {"filename": "2011.12.07-postgresql.tar.gz", "human_size": "10kb", "size": 10240, "state": "completed"},
                    {"filename": "2011.12.08-mongodb.tar.gz", "human_size": "22kb", "size": 22528, "state": "in_progress"}
                ]));
            })
            .await;

        let backups = test_client(&server)
            .database_backups("foo-staging")
            .await
            .unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].filename, "2011.12.07-postgresql.tar.gz");
        assert_eq!(backups[1].state, "in_progress");
    }

    #[tokio::test]
    async fn test_request_backup_kind() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps/foo-staging/database_backups")
                    .json_body(json!({"kind": "postgresql"}));
                then.status(201).json_body(json!({}));
            })
            .await;

        test_client(&server)
            .request_backup("foo-staging", "postgresql")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_restore_missing_backup() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/apps/foo-staging/database_backups/restore")
                    .json_body(json!({"filename": "missing.tar.gz"}));
                then.status(404)
                    .json_body(json!({"resource": "database_backup", "message": "Not found"}));
            })
            .await;

        let err = test_client(&server)
            .restore_backup("foo-staging", "missing.tar.gz")
            .await
            .unwrap_err();
        assert!(err.is_not_found("database_backup"));
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_download_backup_writes_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/database_backups/backup.tar.gz")
                    .header("accept", "application/octet-stream");
                then.status(200).body("backup-content");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("backup.tar.gz");
        let mut progressed = 0;
        let written = test_client(&server)
            .download_backup("foo-staging", "backup.tar.gz", &destination, |n| {
                progressed += n
            })
            .await
            .unwrap();

        assert_eq!(written, 14);
        assert_eq!(progressed, 14);
        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            "backup-content"
        );
    }
}
