use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::backups::STREAM_TIMEOUT;
use super::{ApiResult, Client};

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogRange {
    pub first: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsPage {
    #[serde(default)]
    pub entries: Vec<String>,
    #[serde(default)]
    pub range: LogRange,
}

/// Location of a downloadable daily log archive.
#[derive(Debug, Clone, Deserialize)]
pub struct LogDownload {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct UrlResponse {
    url: String,
}

impl Client {
    pub async fn application_logs(
        &self,
        code_name: &str,
        query: &LogsQuery,
    ) -> ApiResult<LogsPage> {
        self.get_with_query(&["apps", code_name, "application_logs"], query)
            .await
    }

    /// Follow the live log stream, handing every received chunk to `on_chunk`.
    /// Returns when the server closes the stream or when `on_chunk` reports a
    /// broken pipe (the reader went away).
    pub async fn application_logs_tail<F>(
        &self,
        code_name: &str,
        mut on_chunk: F,
    ) -> ApiResult<()>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let tail: UrlResponse = self
            .get(&["apps", code_name, "application_logs", "tail"])
            .await?;

        let builder = self
            .request_url(Method::GET, &tail.url)?
            .timeout(STREAM_TIMEOUT);
        let response = self.execute(builder).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match on_chunk(&chunk?) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Log reader closed, stopping tail");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Resolve the archive for a given day and read its size.
    pub async fn download_application_logs_attributes(
        &self,
        code_name: &str,
        query: &LogsQuery,
    ) -> ApiResult<LogDownload> {
        let mut attributes: LogDownload = self
            .get_with_query(&["apps", code_name, "application_logs", "download"], query)
            .await?;

        let response = self
            .execute(self.request_url(Method::HEAD, &attributes.url)?)
            .await?;
        if let Some(size) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
        {
            attributes.size = size;
        }

        Ok(attributes)
    }

    pub async fn download_application_logs<F>(
        &self,
        download: &LogDownload,
        destination: &Path,
        mut progress: F,
    ) -> ApiResult<u64>
    where
        F: FnMut(u64),
    {
        let builder = self
            .request_url(Method::GET, &download.url)?
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
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_application_logs_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/application_logs")
                    .query_param("limit", "100")
                    .query_param("source", "nginx");
                then.status(200).json_body(json!({
                    "entries": ["GET / 200", "GET /about 200"],
                    "range": {"first": "1", "last": "2"}
                }));
            })
            .await;

        let query = LogsQuery {
            limit: Some(100),
            source: Some("nginx".to_string()),
            ..Default::default()
        };
        let page = test_client(&server)
            .application_logs("foo-staging", &query)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.range.last.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_application_logs_tail_streams_body() {
        let server = MockServer::start_async().await;
        let stream_url = server.url("/stream/foo-staging");
        server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/application_logs/tail");
                then.status(200).json_body(json!({"url": stream_url}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/stream/foo-staging")
                    .header("authorization", "Bearer abc");
                then.status(200).body("line one\nline two\n");
            })
            .await;

        let mut received = Vec::new();
        test_client(&server)
            .application_logs_tail("foo-staging", |chunk| {
                received.extend_from_slice(chunk);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(String::from_utf8(received).unwrap(), "line one\nline two\n");
    }

    async fn tail_server() -> MockServer {
        let server = MockServer::start_async().await;
        let stream_url = server.url("/stream/foo-staging");
        server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/application_logs/tail");
                then.status(200).json_body(json!({"url": stream_url}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/stream/foo-staging");
                then.status(200).body("line one\n");
            })
            .await;
        server
    }

    #[tokio::test]
    async fn test_application_logs_tail_stops_on_broken_pipe() {
        let server = tail_server().await;

        let mut calls = 0;
        let result = test_client(&server)
            .application_logs_tail("foo-staging", |_| {
                calls += 1;
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_application_logs_tail_write_error() {
        let server = tail_server().await;

        let err = test_client(&server)
            .application_logs_tail("foo-staging", |_| {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::client::ApiError::Io(_)));
    }

    #[tokio::test]
    async fn test_download_application_logs() {
        let server = MockServer::start_async().await;
        let archive_url = server.url("/archives/2013-05-01.log.gz");
        server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/apps/foo-staging/application_logs/download")
                    .query_param("date", "2013-05-01");
                then.status(200).json_body(json!({
                    "url": archive_url,
                    "filename": "foo-staging-2013-05-01.log.gz"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/archives/2013-05-01.log.gz");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archives/2013-05-01.log.gz");
                then.status(200).body("archive");
            })
            .await;

        let client = test_client(&server);
        let query = LogsQuery {
            date: Some("2013-05-01".to_string()),
            ..Default::default()
        };
        let download = client
            .download_application_logs_attributes("foo-staging", &query)
            .await
            .unwrap();
        assert_eq!(download.filename, "foo-staging-2013-05-01.log.gz");

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join(&download.filename);
        let written = client
            .download_application_logs(&download, &destination, |_| {})
            .await
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "archive");
    }
}
