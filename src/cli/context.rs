//! Per-invocation state and the guards commands run before doing any work.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::shell::{say, say_error, yes};
use super::{Cli, CliError, CliResult};
use crate::client::{ApiError, Client};
use crate::config::{Config, Credentials};
use crate::git::Git;
use crate::models::{App, Cloudfile, User};

pub const NOT_LOGGED_IN: &str = "You are not logged in. To log in use: `shelly login`";

pub(crate) fn no_access(cloud: &str) -> String {
    format!("You have no access to '{cloud}' cloud defined in Cloudfile")
}

/// Turn a missing-cloud 404 into the no-access message.
pub(crate) fn cloud_access(err: ApiError, cloud: &str) -> CliError {
    if err.is_not_found("cloud") {
        CliError::Message(no_access(cloud))
    } else {
        CliError::Api(err)
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub config_dir: PathBuf,
    pub api_url: String,
    pub timeout: Duration,
    pub cwd: PathBuf,
}

impl Context {
    pub fn new(cli: &Cli, config_dir: PathBuf, config: &Config) -> CliResult<Self> {
        let api_url = cli
            .api_url
            .clone()
            .unwrap_or_else(|| config.api.url.clone());
        let cwd = std::env::current_dir().map_err(anyhow::Error::from)?;

        debug!(api_url = %api_url, config_dir = %config_dir.display(), "CLI context");
        Ok(Self {
            config_dir,
            api_url,
            timeout: Duration::from_secs(config.api.timeout_secs),
            cwd,
        })
    }

    pub fn client(&self, token: Option<String>) -> CliResult<Client> {
        Ok(Client::new(&self.api_url, token, self.timeout)?)
    }

    pub fn user(&self, client: Client) -> User {
        User::new(client, &self.config_dir)
    }

    pub fn git(&self) -> Git {
        Git::new(&self.cwd)
    }

    pub fn cloudfile(&self) -> Cloudfile {
        Cloudfile::open(&self.cwd)
    }

    /// Client authenticated with the saved token, after checking the token
    /// is still accepted.
    pub async fn logged_in(&self) -> CliResult<Client> {
        let Some(credentials) = Credentials::load(&self.config_dir)? else {
            return Err(CliError::message(NOT_LOGGED_IN));
        };

        let client = self.client(Some(credentials.token))?;
        match client.fetch_token().await {
            Ok(_) => Ok(client),
            Err(ApiError::Unauthorized(_)) => Err(CliError::message(NOT_LOGGED_IN)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn inside_git_repository(&self) -> CliResult<Git> {
        let git = self.git();
        if !git.inside_repository().await {
            return Err(CliError::message(
                "Current directory is not a git repository",
            ));
        }
        Ok(git)
    }

    pub fn cloudfile_present(&self) -> CliResult<Cloudfile> {
        let cloudfile = self.cloudfile();
        if !cloudfile.present() {
            return Err(CliError::message("No Cloudfile found"));
        }
        Ok(cloudfile)
    }

    /// Pick the cloud a command works on: `--cloud` when given, otherwise
    /// the only cloud in the Cloudfile.
    pub fn multiple_clouds(
        &self,
        client: &Client,
        cloud: Option<&str>,
        action: &str,
    ) -> CliResult<App> {
        let cloudfile = self.cloudfile();
        let clouds = cloudfile.clouds()?;

        if clouds.len() > 1 && cloud.is_none() {
            say_error("You have multiple clouds in Cloudfile.");
            say(format!(
                "Select cloud using `shelly {} --cloud {}`",
                action, clouds[0]
            ));
            say("Available clouds:");
            for cloud in &clouds {
                say(format!(" * {cloud}"));
            }
            return Err(CliError::Exit(1));
        }

        let Some(code_name) = cloud.map(str::to_string).or_else(|| clouds.first().cloned())
        else {
            return Err(CliError::message(format!(
                "You have to specify cloud using `shelly {action} --cloud CODE_NAME`"
            )));
        };

        let definition = cloudfile.definition(&code_name)?;
        Ok(App::new(client.clone(), code_name).with_definition(definition))
    }
}

/// Whether the cloud's git remote may be (re)written. Asks before
/// overwriting an existing one.
pub(crate) async fn overwrite_remote(app: &App, git: &Git) -> CliResult<bool> {
    if !app.git_remote_exists(git).await? {
        return Ok(true);
    }
    Ok(yes(&format!(
        "Git remote {app} exists, overwrite (yes/no): "
    ))?)
}

/// Arguments meant for rake: everything except `rake`, `--debug` and the
/// `--cloud`/`-c` option with its value.
pub fn rake_args(args: &[String]) -> (Vec<String>, Option<String>) {
    let mut task = Vec::new();
    let mut cloud = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "rake" | "--debug" => {}
            "--cloud" | "-c" => cloud = iter.next().cloned(),
            _ => {
                if let Some(value) = arg.strip_prefix("--cloud=") {
                    cloud = Some(value.to_string());
                } else {
                    task.push(arg.clone());
                }
            }
        }
    }

    (task, cloud)
}
