use serde::{Deserialize, Serialize};

use super::{ApiResult, Client};

/// Entry of `GET /apps`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppSummary {
    pub code_name: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateAppRequest {
    pub code_name: String,
    pub redeem_code: Option<String>,
    pub organization_name: Option<String>,
    pub zone_name: Option<String>,
}

/// Response of `POST /apps`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedApp {
    pub git_url: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub ruby_version: Option<String>,
    pub environment: Option<String>,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitInfo {
    pub repository_url: Option<String>,
    pub deployed_commit_sha: Option<String>,
    pub deployed_commit_message: Option<String>,
    pub deployed_push_author: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    pub name: Option<String>,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub details_present: bool,
}

/// Response of `GET /apps/:code_name`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppAttributes {
    pub code_name: Option<String>,
    pub state: Option<String>,
    pub domain: Option<String>,
    pub web_server_ip: Option<String>,
    pub mail_server_ip: Option<String>,
    #[serde(default)]
    pub git_info: GitInfo,
    #[serde(default)]
    pub organization: Organization,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentEnvelope {
    deployment: Deployment,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub result: String,
}

#[derive(Serialize)]
struct CreateAppEnvelope<'a> {
    app: &'a CreateAppRequest,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    body: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct ConsoleQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<&'a str>,
}

/// Serializes to `{}` for endpoints that take no parameters.
#[derive(Serialize)]
struct Empty {}

impl Client {
    pub async fn apps(&self) -> ApiResult<Vec<AppSummary>> {
        self.get(&["apps"]).await
    }

    pub async fn create_app(&self, request: &CreateAppRequest) -> ApiResult<CreatedApp> {
        self.post(&["apps"], &CreateAppEnvelope { app: request })
            .await
    }

    pub async fn app(&self, code_name: &str) -> ApiResult<AppAttributes> {
        self.get(&["apps", code_name]).await
    }

    pub async fn delete_app(&self, code_name: &str) -> ApiResult<()> {
        self.delete(&["apps", code_name]).await
    }

    pub async fn start_cloud(&self, code_name: &str) -> ApiResult<Deployment> {
        let envelope: DeploymentEnvelope =
            self.put(&["apps", code_name, "start"], &Empty {}).await?;
        Ok(envelope.deployment)
    }

    pub async fn stop_cloud(&self, code_name: &str) -> ApiResult<Deployment> {
        let envelope: DeploymentEnvelope =
            self.put(&["apps", code_name, "stop"], &Empty {}).await?;
        Ok(envelope.deployment)
    }

    pub async fn redeploy(&self, code_name: &str) -> ApiResult<Deployment> {
        let envelope: DeploymentEnvelope =
            self.post(&["apps", code_name, "deploys"], &Empty {}).await?;
        Ok(envelope.deployment)
    }

    pub async fn deployment(&self, code_name: &str, deployment_id: &str) -> ApiResult<Deployment> {
        self.get(&["apps", code_name, "deployments", deployment_id])
            .await
    }

    /// Run code (`ruby`) or a task (`rake`) on one of the application servers.
    pub async fn command(&self, code_name: &str, body: &str, kind: &str) -> ApiResult<String> {
        let result: CommandResult = self
            .post(&["apps", code_name, "command"], &CommandRequest { body, kind })
            .await?;
        Ok(result.result)
    }

    pub async fn console(
        &self,
        code_name: &str,
        server: Option<&str>,
    ) -> ApiResult<ConsoleConnection> {
        self.get_with_query(&["apps", code_name, "console"], &ConsoleQuery { server })
            .await
    }
}
