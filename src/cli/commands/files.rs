//! Persistent storage shared by the cloud's servers, reached over ssh and
//! rsync.

use crate::cli::context::cloud_access;
use crate::cli::shell::{say, yes};
use crate::cli::{CliError, CliResult, Context, FilesCommands};
use crate::client::{ApiError, ConsoleConnection};
use crate::models::App;
use crate::remote::{self, DISK_ROOT};

async fn connect(app: &App) -> CliResult<ConsoleConnection> {
    match app.console_connection(None).await {
        Ok(connection) => Ok(connection),
        Err(ApiError::Conflict(_)) => Err(CliError::message(format!(
            "Cloud {app} wasn't deployed properly. Can not connect to the cloud."
        ))),
        Err(err) => Err(cloud_access(err, &app.code_name)),
    }
}

fn finish(status: i32) -> CliResult {
    if status == 0 {
        Ok(())
    } else {
        Err(CliError::Exit(status))
    }
}

pub async fn run(ctx: &Context, command: FilesCommands) -> CliResult {
    let client = ctx.logged_in().await?;

    match command {
        FilesCommands::List { path, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "files list")?;
            let connection = connect(&app).await?;
            let path = path.unwrap_or_default();
            let listing = format!("ls -l {}/{}", DISK_ROOT, path.trim_start_matches('/'));
            let cmd = remote::ssh_command(&connection, Some(&listing));
            finish(remote::run_interactive(cmd).await?)
        }
        FilesCommands::Upload { path, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "files upload")?;
            let connection = connect(&app).await?;
            let destination = remote::disk_path(&connection, "");
            let cmd = remote::rsync_command(&connection, &path, &destination);
            finish(remote::run_interactive(cmd).await?)
        }
        FilesCommands::Download {
            source,
            destination,
            cloud,
        } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "files download")?;
            let connection = connect(&app).await?;
            let source = remote::disk_path(&connection, source.as_deref().unwrap_or_default());
            let destination = destination.unwrap_or_else(|| ".".to_string());
            let cmd = remote::rsync_command(&connection, &source, &destination);
            finish(remote::run_interactive(cmd).await?)
        }
        FilesCommands::Delete { path, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "files delete")?;
            say(format!("You are about to delete files in {path} of cloud {app}."));
            if !yes("I want to delete the files (yes/no):")? {
                say("Files not deleted");
                return Ok(());
            }

            let connection = connect(&app).await?;
            let command = format!("delete_file {path}");
            let cmd = remote::ssh_command(&connection, Some(&command));
            finish(remote::run_interactive(cmd).await?)
        }
    }
}
