use serde::Deserialize;

use super::{ApiResult, Client};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployLogSummary {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub failed: bool,
}

/// Full log of a single deploy. Each section is present only when that step
/// ran during the deploy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployLog {
    pub created_at: String,
    #[serde(default)]
    pub failed: bool,
    pub bundle_install: Option<String>,
    pub whenever: Option<String>,
    pub callbacks: Option<String>,
    pub delayed_job: Option<String>,
    pub sidekiq: Option<String>,
    pub clockwork: Option<String>,
    pub thin_restart: Option<String>,
    pub puma_restart: Option<String>,
}

impl DeployLog {
    /// Present sections in the order they run, with their headings.
    pub fn sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("Starting bundle install", &self.bundle_install),
            ("Starting whenever", &self.whenever),
            ("Starting callbacks", &self.callbacks),
            ("Starting delayed job", &self.delayed_job),
            ("Starting sidekiq", &self.sidekiq),
            ("Starting clockwork", &self.clockwork),
            ("Starting thin", &self.thin_restart),
            ("Starting puma", &self.puma_restart),
        ]
        .into_iter()
        .filter_map(|(heading, content)| content.as_deref().map(|c| (heading, c)))
        .collect()
    }
}

impl Client {
    pub async fn deploy_logs(&self, code_name: &str) -> ApiResult<Vec<DeployLogSummary>> {
        self.get(&["apps", code_name, "deployment_logs"]).await
    }

    /// Fetch a deploy log by id, or `last` for the newest one.
    pub async fn deploy_log(&self, code_name: &str, log: &str) -> ApiResult<DeployLog> {
        self.get(&["apps", code_name, "deployment_logs", log]).await
    }
}
