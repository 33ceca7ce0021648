use serde::{Deserialize, Serialize};

use super::{ApiResult, Client};

/// Configuration file attached to a cloud.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigFile {
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    /// `false` for files generated by the platform.
    #[serde(default)]
    pub created_by_user: bool,
}

#[derive(Serialize)]
struct ConfigEnvelope<'a> {
    config: ConfigBody<'a>,
}

#[derive(Serialize)]
struct ConfigBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    content: &'a str,
}

impl Client {
    pub async fn app_configs(&self, code_name: &str) -> ApiResult<Vec<ConfigFile>> {
        self.get(&["apps", code_name, "configs"]).await
    }

    pub async fn app_config(&self, code_name: &str, path: &str) -> ApiResult<ConfigFile> {
        self.get(&["apps", code_name, "configs", path]).await
    }

    pub async fn app_create_config(
        &self,
        code_name: &str,
        path: &str,
        content: &str,
    ) -> ApiResult<()> {
        let body = ConfigEnvelope {
            config: ConfigBody {
                path: Some(path),
                content,
            },
        };
        self.post_unit(&["apps", code_name, "configs"], &body).await
    }

    pub async fn app_update_config(
        &self,
        code_name: &str,
        path: &str,
        content: &str,
    ) -> ApiResult<()> {
        let body = ConfigEnvelope {
            config: ConfigBody {
                path: None,
                content,
            },
        };
        self.put_unit(&["apps", code_name, "configs", path], &body)
            .await
    }

    pub async fn app_delete_config(&self, code_name: &str, path: &str) -> ApiResult<()> {
        self.delete(&["apps", code_name, "configs", path]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_app_configs() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/apps/foo-staging/configs");
                then.status(200).json_body(json!([
                    {"path": "config/settings.yml", "created_by_user": true},
                    {"path": "config/database.yml", "created_by_user": false}
                ]));
            })
            .await;

        let configs = test_client(&server)
            .app_configs("foo-staging")
            .await
            .unwrap();
        assert_eq!(configs.len(), 2);
        assert!(configs[0].created_by_user);
        assert_eq!(configs[1].content, None);
    }

    #[tokio::test]
    async fn test_create_config() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps/foo-staging/configs")
                    .json_body(json!({"config": {"path": "config/app.yml", "content": "key: value\n"}}));
                then.status(201).json_body(json!({}));
            })
            .await;

        test_client(&server)
            .app_create_config("foo-staging", "config/app.yml", "key: value\n")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_config_omits_path_from_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/apps/foo-staging/configs/settings.yml")
                    .json_body(json!({"config": {"content": "key: other\n"}}));
                then.status(200).json_body(json!({}));
            })
            .await;

        test_client(&server)
            .app_update_config("foo-staging", "settings.yml", "key: other\n")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
