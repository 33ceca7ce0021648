//! Command-line interface for Shelly Cloud.
//!
//! Top-level actions manage accounts and clouds (`login`, `add`, `start`,
//! `logs`...); the `user`, `backup`, `deploys`, `config` and `files` groups
//! manage one aspect of a cloud each.

mod commands;
mod context;
pub mod shell;

pub use context::{rake_args, Context, NOT_LOGGED_IN};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::client::{error::humanize, ApiError, VERSION};
use crate::config::Config;
use crate::git::GitError;
use shell::say_error;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "shelly")]
#[command(author, about = "Command line tool for Shelly Cloud", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// API URL (default: https://api.shellycloud.com/apiv2)
    #[arg(long, env = "SHELLY_URL", global = true)]
    pub api_url: Option<String>,

    /// Directory with config.toml and saved credentials (default: ~/.shelly)
    #[arg(long, env = "SHELLY_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Override log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log API requests and external commands
    #[arg(long, global = true)]
    pub debug: bool,

    /// Display shelly version
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Cloud selection shared by most commands.
#[derive(Args, Debug, Clone, Default)]
pub struct CloudArg {
    /// Specify cloud
    #[arg(short, long)]
    pub cloud: Option<String>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display shelly version
    Version,

    /// Register new account
    Register {
        email: Option<String>,
    },

    /// Log into Shelly Cloud
    Login {
        email: Option<String>,
    },

    /// Logout from Shelly Cloud
    Logout,

    /// Add a new cloud
    Add(AddArgs),

    /// List available clouds
    #[command(visible_alias = "status")]
    List,

    /// List cloud's IP addresses
    Ip,

    /// Show basic information about cloud
    Info(CloudArg),

    /// Start the cloud
    Start(CloudArg),

    /// Shutdown the cloud
    Stop(CloudArg),

    /// Delete the cloud
    Delete(CloudArg),

    /// Set up clouds defined in Cloudfile
    Setup,

    /// Redeploy application
    Redeploy(CloudArg),

    /// Show latest application logs
    Logs(LogsArgs),

    /// Run code on one of application servers. If a file name is given, run
    /// contents of that file.
    Execute {
        code_or_file: String,
        #[command(flatten)]
        cloud: CloudArg,
    },

    /// Run rake task
    Rake {
        /// Task and its arguments; `--cloud` may appear anywhere
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Open ruby console
    Console {
        #[command(flatten)]
        cloud: CloudArg,
        /// Server to connect to
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Run rails dbconsole
    Dbconsole(CloudArg),

    /// Manage collaborators
    #[command(subcommand)]
    User(UserCommands),

    /// Manage database backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// View deploy logs
    #[command(subcommand)]
    Deploys(DeploysCommands),

    /// Manage application configuration files
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Upload and download files to and from persistent storage
    #[command(subcommand)]
    Files(FilesCommands),
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Unique code-name of your cloud
    #[arg(short = 'c', long)]
    pub code_name: Option<String>,

    /// List of databases of your choice (postgresql, mongodb, redis, none)
    #[arg(short, long, value_delimiter = ',', num_args = 1..)]
    pub databases: Option<Vec<String>>,

    /// Server size
    #[arg(short, long, default_value = "large", value_parser = ["small", "large"])]
    pub size: String,

    /// Redeem code for free credits
    #[arg(short, long)]
    pub redeem_code: Option<String>,

    /// Add cloud to existing organization
    #[arg(short, long)]
    pub organization: Option<String>,

    /// Create cloud in given zone
    #[arg(short, long)]
    pub zone: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: Option<LogsCommands>,

    #[command(flatten)]
    pub cloud: CloudArg,

    /// Amount of messages to show
    #[arg(short = 'n', long, default_value_t = 100, allow_negative_numbers = true)]
    pub limit: i64,

    /// Limit logs to a single source, e.g. nginx
    #[arg(short, long)]
    pub source: Option<String>,

    /// Time from which to find the logs
    #[arg(long)]
    pub from: Option<String>,

    /// Show new logs automatically
    #[arg(short, long)]
    pub tail: bool,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommands {
    /// Download log file of a given day (YYYY-MM-DD)
    Get {
        date: String,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List users with access to the cloud
    List(CloudArg),
    /// Add new developer to the cloud
    Add {
        email: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Remove developer from the cloud
    Delete {
        email: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// List available database backups
    List(CloudArg),
    /// Download database backup (the last one by default)
    Get {
        handler: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Create backup of given databases. Without kinds, every database from
    /// the Cloudfile except redis is backed up.
    Create {
        kinds: Vec<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Restore database to state from given backup
    Restore {
        filename: String,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeploysCommands {
    /// Lists deploy logs
    List(CloudArg),
    /// Show specific deploy log (`last` for the newest one)
    Show {
        log: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// List configuration files
    List(CloudArg),
    /// View configuration file
    Show {
        path: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Create configuration file
    Create {
        path: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Edit configuration file
    #[command(visible_alias = "update")]
    Edit {
        path: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Delete configuration file
    Delete {
        path: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum FilesCommands {
    /// List files in given path
    List {
        path: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Upload files to persistent data storage
    Upload {
        path: String,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Download files from persistent data storage
    Download {
        source: Option<String>,
        destination: Option<String>,
        #[command(flatten)]
        cloud: CloudArg,
    },
    /// Delete files from persistent data storage
    Delete {
        path: String,
        #[command(flatten)]
        cloud: CloudArg,
    },
}

/// Errors a command returns to `main`.
#[derive(Debug, Error)]
pub enum CliError {
    /// Printed as an error, exit status 1.
    #[error("{0}")]
    Message(String),

    /// Already reported to the user.
    #[error("exit status {0}")]
    Exit(i32),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn message(message: impl Into<String>) -> Self {
        CliError::Message(message.into())
    }
}

pub type CliResult<T = ()> = Result<T, CliError>;

/// Run a CLI command
pub async fn run(cli: Cli, config_dir: PathBuf, config: Config) -> CliResult {
    let ctx = Context::new(&cli, config_dir, &config)?;

    let Some(command) = cli.command else {
        if cli.version {
            commands::account::version();
            return Ok(());
        }
        return Err(CliError::message("Try `shelly help` for a list of commands"));
    };

    match command {
        Commands::Version => {
            commands::account::version();
            Ok(())
        }
        Commands::Register { email } => commands::account::register(&ctx, email).await,
        Commands::Login { email } => commands::account::login(&ctx, email).await,
        Commands::Logout => commands::account::logout(&ctx).await,
        Commands::Add(args) => commands::clouds::add(&ctx, args).await,
        Commands::List => commands::clouds::list(&ctx).await,
        Commands::Ip => commands::clouds::ip(&ctx).await,
        Commands::Info(cloud) => commands::clouds::info(&ctx, cloud).await,
        Commands::Start(cloud) => commands::clouds::start(&ctx, cloud).await,
        Commands::Stop(cloud) => commands::clouds::stop(&ctx, cloud).await,
        Commands::Delete(cloud) => commands::clouds::delete(&ctx, cloud).await,
        Commands::Setup => commands::clouds::setup(&ctx).await,
        Commands::Redeploy(cloud) => commands::clouds::redeploy(&ctx, cloud).await,
        Commands::Logs(args) => commands::logs::run(&ctx, args).await,
        Commands::Execute {
            code_or_file,
            cloud,
        } => commands::execute::execute(&ctx, &code_or_file, cloud).await,
        Commands::Rake { args } => commands::execute::rake(&ctx, &args).await,
        Commands::Console { cloud, server } => {
            commands::execute::console(&ctx, cloud, server.as_deref()).await
        }
        Commands::Dbconsole(cloud) => commands::execute::dbconsole(&ctx, cloud).await,
        Commands::User(command) => commands::user::run(&ctx, command).await,
        Commands::Backup(command) => commands::backup::run(&ctx, command).await,
        Commands::Deploys(command) => commands::deploys::run(&ctx, command).await,
        Commands::Config(command) => commands::config::run(&ctx, command).await,
        Commands::Files(command) => commands::files::run(&ctx, command).await,
    }
}

/// Print an error no command handled and return the process exit status.
pub fn report(err: &CliError) -> i32 {
    match err {
        CliError::Exit(code) => *code,
        CliError::Message(message) => {
            say_error(message);
            1
        }
        CliError::Api(err) => {
            report_api_error(err);
            1
        }
        CliError::Git(err) => {
            say_error(err);
            1
        }
        CliError::Other(err) => {
            match err.downcast_ref::<ApiError>() {
                Some(api) => report_api_error(api),
                None => say_error(format!("{err:#}")),
            }
            1
        }
    }
}

fn report_api_error(err: &ApiError) {
    match err {
        ApiError::Unauthorized(_) => say_error(NOT_LOGGED_IN),
        ApiError::VersionMismatch(payload) => {
            let required = payload
                .get("required_version")
                .or_else(|| payload.message())
                .unwrap_or("unknown");
            say_error(format!("Required shelly version: {required}"));
            say_error(format!("Your version: {VERSION}"));
        }
        ApiError::GatewayTimeout => say_error("Server timeout, try again later"),
        ApiError::Validation(payload) => {
            for message in payload.validation_messages() {
                say_error(message);
            }
        }
        ApiError::NotFound {
            resource: Some(resource),
            id,
            ..
        } if resource == "cloud" => {
            say_error(context::no_access(id.as_deref().unwrap_or("unknown")));
        }
        ApiError::NotFound {
            resource: Some(resource),
            ..
        } => say_error(format!("{} not found", humanize(resource))),
        other => {
            debug!(error = ?other, "Unhandled API error");
            let message = other
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string());
            say_error(format!("Unknown error: {message}"));
        }
    }
}
