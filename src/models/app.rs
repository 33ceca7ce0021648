//! A cloud (application instance) and the operations available on it.

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use tokio::sync::OnceCell;

use super::backup::Backup;
use super::cloudfile::{CloudDefinition, Cloudfile, CloudfileEntry};
use crate::client::{
    ApiResult, AppAttributes, Client, Collaborator, ConfigFile, ConsoleConnection,
    CreateAppRequest, DeployLog, DeployLogSummary, Deployment, GitInfo, LogDownload, LogsPage,
    LogsQuery,
};
use crate::git::{Git, GitError};

pub const DATABASE_KINDS: &[&str] = &["postgresql", "mongodb", "redis"];
pub const DATABASE_CHOICES: &[&str] = &["postgresql", "mongodb", "redis", "none"];
pub const SERVER_SIZES: &[&str] = &["small", "large"];
pub const DEFAULT_SIZE: &str = "large";
pub const DEFAULT_DATABASE: &str = "postgresql";

const DEFAULT_RUBY_VERSION: &str = "2.0.0";
const DEFAULT_ENVIRONMENT: &str = "production";

/// True when every kind is a known database choice (`none` included).
pub fn valid_databases<S: AsRef<str>>(kinds: &[S]) -> bool {
    kinds
        .iter()
        .all(|kind| DATABASE_CHOICES.contains(&kind.as_ref()))
}

#[derive(Debug)]
pub struct App {
    client: Client,
    pub code_name: String,
    pub databases: Vec<String>,
    pub ruby_version: Option<String>,
    pub environment: Option<String>,
    pub git_url: Option<String>,
    pub domains: Vec<String>,
    pub size: String,
    pub redeem_code: Option<String>,
    pub organization: Option<String>,
    pub zone_name: Option<String>,
    pub trial: bool,
    definition: Option<CloudDefinition>,
    attributes: OnceCell<AppAttributes>,
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code_name)
    }
}

impl App {
    pub fn new(client: Client, code_name: impl Into<String>) -> Self {
        Self {
            client,
            code_name: code_name.into(),
            databases: Vec::new(),
            ruby_version: None,
            environment: None,
            git_url: None,
            domains: Vec::new(),
            size: DEFAULT_SIZE.to_string(),
            redeem_code: None,
            organization: None,
            zone_name: None,
            trial: false,
            definition: None,
            attributes: OnceCell::new(),
        }
    }

    /// Attach this cloud's section of the Cloudfile.
    pub fn with_definition(mut self, definition: Option<CloudDefinition>) -> Self {
        self.definition = definition;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Assign database kinds; `none` means no database.
    pub fn set_databases<S: AsRef<str>>(&mut self, kinds: &[S]) {
        self.databases = kinds
            .iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| k != "none")
            .collect();
    }

    pub fn thin(&self) -> u32 {
        if self.size == "small" {
            2
        } else {
            4
        }
    }

    pub fn puma(&self) -> u32 {
        if self.size == "small" {
            1
        } else {
            2
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the cloud and take git URL, domains, ruby version and
    /// environment from the response.
    pub async fn create(&mut self) -> ApiResult<()> {
        let request = CreateAppRequest {
            code_name: self.code_name.clone(),
            redeem_code: self.redeem_code.clone(),
            organization_name: self.organization.clone(),
            zone_name: self.zone_name.clone(),
        };
        let created = self.client.create_app(&request).await?;

        self.git_url = created.git_url;
        self.domains = created.domains;
        self.ruby_version = created.ruby_version;
        self.environment = created.environment;
        self.trial = created.trial;
        Ok(())
    }

    pub async fn delete(&self) -> ApiResult<()> {
        self.client.delete_app(&self.code_name).await
    }

    /// Returns the id of the started deployment.
    pub async fn start(&self) -> ApiResult<String> {
        Ok(self.client.start_cloud(&self.code_name).await?.id)
    }

    pub async fn stop(&self) -> ApiResult<String> {
        Ok(self.client.stop_cloud(&self.code_name).await?.id)
    }

    pub async fn redeploy(&self) -> ApiResult<String> {
        Ok(self.client.redeploy(&self.code_name).await?.id)
    }

    pub async fn deployment(&self, deployment_id: &str) -> ApiResult<Deployment> {
        self.client.deployment(&self.code_name, deployment_id).await
    }

    // ------------------------------------------------------------------
    // Remote attributes
    // ------------------------------------------------------------------

    /// Attributes from the API, fetched once per `App`.
    pub async fn attributes(&self) -> ApiResult<&AppAttributes> {
        self.attributes
            .get_or_try_init(|| self.client.app(&self.code_name))
            .await
    }

    pub async fn state(&self) -> ApiResult<Option<String>> {
        Ok(self.attributes().await?.state.clone())
    }

    pub async fn web_server_ip(&self) -> ApiResult<Option<String>> {
        Ok(self.attributes().await?.web_server_ip.clone())
    }

    pub async fn mail_server_ip(&self) -> ApiResult<Option<String>> {
        Ok(self.attributes().await?.mail_server_ip.clone())
    }

    pub async fn git_info(&self) -> ApiResult<GitInfo> {
        Ok(self.attributes().await?.git_info.clone())
    }

    pub async fn credit(&self) -> ApiResult<f64> {
        Ok(self.attributes().await?.organization.credit)
    }

    pub async fn organization_details_present(&self) -> ApiResult<bool> {
        Ok(self.attributes().await?.organization.details_present)
    }

    /// Whether any commit has been deployed yet.
    pub async fn deployed(&self) -> ApiResult<bool> {
        Ok(self
            .git_info()
            .await?
            .deployed_commit_sha
            .is_some_and(|sha| !sha.is_empty()))
    }

    /// Local commits not deployed yet, newest first.
    pub async fn pending_commits(&self, git: &Git) -> Result<Vec<String>> {
        let info = self.git_info().await?;
        let Some(sha) = info.deployed_commit_sha.filter(|s| !s.is_empty()) else {
            return Ok(Vec::new());
        };
        Ok(git.pending_commits(&sha).await?)
    }

    pub fn edit_billing_url(&self, shellyapp_url: &str) -> String {
        let organization = self.organization.as_deref().unwrap_or(&self.code_name);
        format!(
            "{}/organizations/{}/edit",
            shellyapp_url.trim_end_matches('/'),
            organization
        )
    }

    // ------------------------------------------------------------------
    // Logs and deploys
    // ------------------------------------------------------------------

    pub async fn deploy_logs(&self) -> ApiResult<Vec<DeployLogSummary>> {
        self.client.deploy_logs(&self.code_name).await
    }

    pub async fn deploy_log(&self, log: &str) -> ApiResult<DeployLog> {
        self.client.deploy_log(&self.code_name, log).await
    }

    pub async fn application_logs(&self, query: &LogsQuery) -> ApiResult<LogsPage> {
        self.client.application_logs(&self.code_name, query).await
    }

    pub async fn application_logs_tail<F>(&self, on_chunk: F) -> ApiResult<()>
    where
        F: FnMut(&[u8]) -> std::io::Result<()>,
    {
        self.client
            .application_logs_tail(&self.code_name, on_chunk)
            .await
    }

    pub async fn download_application_logs_attributes(
        &self,
        date: &str,
    ) -> ApiResult<LogDownload> {
        let query = LogsQuery {
            date: Some(date.to_string()),
            ..Default::default()
        };
        self.client
            .download_application_logs_attributes(&self.code_name, &query)
            .await
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    pub async fn database_backups(&self) -> ApiResult<Vec<Backup>> {
        Ok(self
            .client
            .database_backups(&self.code_name)
            .await?
            .into_iter()
            .map(|attributes| Backup::new(&self.code_name, attributes))
            .collect())
    }

    pub async fn database_backup(&self, handler: &str) -> ApiResult<Backup> {
        let attributes = self
            .client
            .database_backup(&self.code_name, handler)
            .await?;
        Ok(Backup::new(&self.code_name, attributes))
    }

    pub async fn request_backup<S: AsRef<str>>(&self, kinds: &[S]) -> ApiResult<()> {
        for kind in kinds {
            self.client
                .request_backup(&self.code_name, kind.as_ref())
                .await?;
        }
        Ok(())
    }

    pub async fn restore_backup(&self, filename: &str) -> ApiResult<()> {
        self.client.restore_backup(&self.code_name, filename).await
    }

    // ------------------------------------------------------------------
    // Configuration files
    // ------------------------------------------------------------------

    pub async fn configs(&self) -> ApiResult<Vec<ConfigFile>> {
        self.client.app_configs(&self.code_name).await
    }

    pub async fn user_configs(&self) -> ApiResult<Vec<ConfigFile>> {
        Ok(self
            .configs()
            .await?
            .into_iter()
            .filter(|c| c.created_by_user)
            .collect())
    }

    pub async fn generated_configs(&self) -> ApiResult<Vec<ConfigFile>> {
        Ok(self
            .configs()
            .await?
            .into_iter()
            .filter(|c| !c.created_by_user)
            .collect())
    }

    pub async fn config(&self, path: &str) -> ApiResult<ConfigFile> {
        self.client.app_config(&self.code_name, path).await
    }

    pub async fn create_config(&self, path: &str, content: &str) -> ApiResult<()> {
        self.client
            .app_create_config(&self.code_name, path, content)
            .await
    }

    pub async fn update_config(&self, path: &str, content: &str) -> ApiResult<()> {
        self.client
            .app_update_config(&self.code_name, path, content)
            .await
    }

    pub async fn delete_config(&self, path: &str) -> ApiResult<()> {
        self.client.app_delete_config(&self.code_name, path).await
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub async fn collaborations(&self) -> ApiResult<Vec<Collaborator>> {
        self.client.collaborations(&self.code_name).await
    }

    pub async fn send_invitation(&self, email: &str) -> ApiResult<()> {
        self.client.send_invitation(&self.code_name, email).await
    }

    pub async fn delete_collaboration(&self, email: &str) -> ApiResult<()> {
        self.client
            .delete_collaboration(&self.code_name, email)
            .await
    }

    // ------------------------------------------------------------------
    // Remote execution
    // ------------------------------------------------------------------

    /// Run ruby code on an application server. When `code_or_file` names an
    /// existing file, its content is sent instead.
    pub async fn run(&self, code_or_file: &str) -> Result<String> {
        let path = Path::new(code_or_file);
        let code = if path.is_file() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
        } else {
            code_or_file.to_string()
        };
        Ok(self.client.command(&self.code_name, &code, "ruby").await?)
    }

    pub async fn rake(&self, task: &str) -> ApiResult<String> {
        self.client.command(&self.code_name, task, "rake").await
    }

    pub async fn console_connection(
        &self,
        server: Option<&str>,
    ) -> ApiResult<ConsoleConnection> {
        self.client.console(&self.code_name, server).await
    }

    // ------------------------------------------------------------------
    // Cloudfile
    // ------------------------------------------------------------------

    /// Database kinds used by this cloud according to the Cloudfile.
    pub fn cloud_databases(&self) -> Vec<String> {
        self.definition
            .as_ref()
            .map(CloudDefinition::databases)
            .unwrap_or_default()
    }

    /// Databases that can be backed up (everything except redis).
    pub fn backup_databases(&self) -> Vec<String> {
        self.cloud_databases()
            .into_iter()
            .filter(|kind| kind != "redis")
            .collect()
    }

    fn option(&self, option: &str) -> bool {
        self.definition
            .as_ref()
            .is_some_and(|d| d.has_option(option))
    }

    pub fn delayed_job(&self) -> bool {
        self.option("delayed_job")
    }

    pub fn whenever(&self) -> bool {
        self.option("whenever")
    }

    pub fn sidekiq(&self) -> bool {
        self.option("sidekiq")
    }

    pub fn clockwork(&self) -> bool {
        self.option("clockwork")
    }

    pub fn cloudfile_entry(&self) -> CloudfileEntry {
        CloudfileEntry {
            code_name: self.code_name.clone(),
            ruby_version: self
                .ruby_version
                .clone()
                .unwrap_or_else(|| DEFAULT_RUBY_VERSION.to_string()),
            environment: self
                .environment
                .clone()
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            domains: self.domains.clone(),
            size: self.size.clone(),
            databases: self.databases.clone(),
        }
    }

    pub fn generate_cloudfile(&self) -> String {
        self.cloudfile_entry().render()
    }

    pub fn create_cloudfile(&self, cloudfile: &Cloudfile) -> Result<()> {
        cloudfile.append(&self.generate_cloudfile())
    }

    // ------------------------------------------------------------------
    // Git
    // ------------------------------------------------------------------

    pub async fn git_remote_exists(&self, git: &Git) -> Result<bool, GitError> {
        git.remote_exists(&self.code_name).await
    }

    pub async fn add_git_remote(&self, git: &Git) -> Result<()> {
        let url = self
            .git_url
            .as_deref()
            .context("Cloud has no git repository URL")?;
        git.add_remote(&self.code_name, url).await?;
        Ok(())
    }

    pub async fn remove_git_remote(&self, git: &Git) -> Result<(), GitError> {
        git.remove_remote(&self.code_name).await
    }

    pub async fn git_fetch_remote(&self, git: &Git) -> Result<(), GitError> {
        git.fetch_remote(&self.code_name).await
    }

    pub async fn git_add_tracking_branch(&self, git: &Git) -> Result<(), GitError> {
        git.add_tracking_branch(&self.code_name).await
    }

    /// Suggest a code name for a new cloud in the project at `dir`:
    /// `<dir>-staging` first, then `<dir>-production`, `<dir>-production1`...
    pub fn guess_code_name(dir: &Path, cloudfile: &Cloudfile) -> Result<String> {
        let base = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "cloud".to_string());

        let clouds = cloudfile.clouds()?;
        let mut guessed = None;
        if clouds.iter().any(|c| c.contains("staging")) {
            guessed = Some("production".to_string());

            let pattern = Regex::new(r"production(\d*)").context("Invalid pattern")?;
            let mut production: Vec<&String> =
                clouds.iter().filter(|c| c.contains("production")).collect();
            production.sort();
            for cloud in production {
                if let Some(captures) = pattern.captures(cloud) {
                    let number: u32 = captures[1].parse().unwrap_or(0);
                    guessed = Some(format!("production{}", number + 1));
                }
            }
        }

        let name = format!("{}-{}", base, guessed.as_deref().unwrap_or("staging"));
        Ok(dasherize(&name.to_lowercase()))
    }
}

fn dasherize(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn project(cloudfile: Option<&str>) -> TempDir {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("foo");
        std::fs::create_dir(&dir).unwrap();
        if let Some(content) = cloudfile {
            std::fs::write(dir.join("Cloudfile"), content).unwrap();
        }
        root
    }

    fn guess(root: &TempDir) -> String {
        let dir = root.path().join("foo");
        App::guess_code_name(&dir, &Cloudfile::open(&dir)).unwrap()
    }

    #[test]
    fn test_guess_code_name_defaults_to_staging() {
        assert_eq!(guess(&project(None)), "foo-staging");
    }

    #[test]
    fn test_guess_code_name_after_staging() {
        assert_eq!(
            guess(&project(Some("foo-staging:\n  environment: production\n"))),
            "foo-production"
        );
    }

    #[test]
    fn test_guess_code_name_increments_production() {
        let root = project(Some(
            "foo-staging:\n  environment: production\nfoo-production:\n  environment: production\n",
        ));
        assert_eq!(guess(&root), "foo-production1");

        let root = project(Some(
            "foo-staging:\nfoo-production:\nfoo-production1:\n",
        ));
        assert_eq!(guess(&root), "foo-production2");
    }

    #[test]
    fn test_guess_code_name_dasherizes() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("My_Project");
        std::fs::create_dir(&dir).unwrap();
        assert_eq!(
            App::guess_code_name(&dir, &Cloudfile::open(&dir)).unwrap(),
            "my-project-staging"
        );
    }

    #[test]
    fn test_valid_databases() {
        assert!(valid_databases(&["postgresql", "redis"]));
        assert!(valid_databases(&["none"]));
        assert!(valid_databases::<&str>(&[]));
        assert!(!valid_databases(&["postgresql", "mysql"]));
    }

    #[test]
    fn test_set_databases_strips_none() {
        let client = Client::new(
            "https://api.example.com",
            None,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let mut app = App::new(client, "foo-staging");
        app.set_databases(&["postgresql", "none"]);
        assert_eq!(app.databases, vec!["postgresql"]);
    }

    #[test]
    fn test_workers_by_size() {
        let client = Client::new(
            "https://api.example.com",
            None,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let mut app = App::new(client, "foo-staging");
        app.size = "small".to_string();
        assert_eq!((app.thin(), app.puma()), (2, 1));
        app.size = "large".to_string();
        assert_eq!((app.thin(), app.puma()), (4, 2));
    }

    #[test]
    fn test_backup_databases_skip_redis() {
        let root = project(Some(
            "foo-staging:\n  servers:\n    app1:\n      databases:\n        - postgresql\n        - redis\n      delayed_job: 1\n",
        ));
        let cloudfile = Cloudfile::open(&root.path().join("foo"));
        let client = Client::new(
            "https://api.example.com",
            None,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let app = App::new(client, "foo-staging")
            .with_definition(cloudfile.definition("foo-staging").unwrap());

        assert_eq!(app.cloud_databases(), vec!["postgresql", "redis"]);
        assert_eq!(app.backup_databases(), vec!["postgresql"]);
        assert!(app.delayed_job());
        assert!(!app.whenever());
        assert!(!app.sidekiq());
    }

    #[test]
    fn test_edit_billing_url() {
        let client = Client::new(
            "https://api.example.com",
            None,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let mut app = App::new(client, "foo-staging");
        assert_eq!(
            app.edit_billing_url("https://shellyapp.example.com/"),
            "https://shellyapp.example.com/organizations/foo-staging/edit"
        );
        app.organization = Some("acme".to_string());
        assert_eq!(
            app.edit_billing_url("https://shellyapp.example.com"),
            "https://shellyapp.example.com/organizations/acme/edit"
        );
    }

    #[tokio::test]
    async fn test_create_assigns_attributes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/apps");
                then.status(201).json_body(json!({
                    "git_url": "git@git.example.com:fooo.git",
                    "domains": ["fooo.shellyapp.com"],
                    "ruby_version": "1.9.2",
                    "environment": "production"
                }));
            })
            .await;

        let mut app = App::new(test_client(&server), "fooo");
        app.create().await.unwrap();
        assert_eq!(app.git_url.as_deref(), Some("git@git.example.com:fooo.git"));
        assert_eq!(app.domains, vec!["fooo.shellyapp.com"]);
        assert_eq!(app.ruby_version.as_deref(), Some("1.9.2"));
        assert_eq!(app.environment.as_deref(), Some("production"));
        assert!(!app.trial);
    }

    #[tokio::test]
    async fn test_attributes_are_fetched_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/apps/foo-staging");
                then.status(200).json_body(json!({
                    "state": "running",
                    "web_server_ip": "10.0.0.1",
                    "mail_server_ip": "10.0.0.2",
                    "git_info": {"deployed_commit_sha": "abc123"}
                }));
            })
            .await;

        let app = App::new(test_client(&server), "foo-staging");
        assert_eq!(app.state().await.unwrap().as_deref(), Some("running"));
        assert_eq!(
            app.web_server_ip().await.unwrap().as_deref(),
            Some("10.0.0.1")
        );
        assert_eq!(
            app.mail_server_ip().await.unwrap().as_deref(),
            Some("10.0.0.2")
        );
        assert!(app.deployed().await.unwrap());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_request_backup_for_each_kind() {
        let server = MockServer::start_async().await;
        let postgresql = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps/foo-staging/database_backups")
                    .json_body(json!({"kind": "postgresql"}));
                then.status(201).json_body(json!({}));
            })
            .await;
        let mongodb = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps/foo-staging/database_backups")
                    .json_body(json!({"kind": "mongodb"}));
                then.status(201).json_body(json!({}));
            })
            .await;

        let app = App::new(test_client(&server), "foo-staging");
        app.request_backup(&["postgresql", "mongodb"]).await.unwrap();
        postgresql.assert_async().await;
        mongodb.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_sends_file_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps/foo-staging/command")
                    .json_body(json!({"body": "User.count\n", "type": "ruby"}));
                then.status(200).json_body(json!({"result": "3"}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("count.rb");
        std::fs::write(&script, "User.count\n").unwrap();

        let app = App::new(test_client(&server), "foo-staging");
        let result = app.run(script.to_str().unwrap()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(result, "3");
    }

    #[tokio::test]
    async fn test_user_and_generated_configs() {
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

        let app = App::new(test_client(&server), "foo-staging");
        let user = app.user_configs().await.unwrap();
        let generated = app.generated_configs().await.unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].path, "config/settings.yml");
        assert_eq!(generated[0].path, "config/database.yml");
    }
}
