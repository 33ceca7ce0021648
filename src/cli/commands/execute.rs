//! Running code on a cloud: ruby snippets and rake tasks through the API,
//! consoles over ssh.

use crate::cli::context::cloud_access;
use crate::cli::shell::say;
use crate::cli::{rake_args, CliError, CliResult, CloudArg, Context};
use crate::client::{ApiError, ConsoleConnection};
use crate::models::App;
use crate::remote;

const APP_NOT_RUNNING: &str = "App not running";

fn not_running(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ApiError>(),
        Some(api) if api.message() == Some(APP_NOT_RUNNING)
    )
}

pub async fn execute(ctx: &Context, code_or_file: &str, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    ctx.cloudfile_present()?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "execute")?;

    match app.run(code_or_file).await {
        Ok(result) => {
            say(result);
            Ok(())
        }
        Err(err) if not_running(&err) => Err(CliError::message(format!(
            "Cloud {app} is not running. Cannot run code."
        ))),
        Err(err) => match err.downcast::<ApiError>() {
            Ok(api) => Err(cloud_access(api, &app.code_name)),
            Err(err) => Err(err.into()),
        },
    }
}

pub async fn rake(ctx: &Context, args: &[String]) -> CliResult {
    let client = ctx.logged_in().await?;
    ctx.cloudfile_present()?;

    let (task, cloud) = rake_args(args);
    let task = task.join(" ");
    let app = ctx.multiple_clouds(&client, cloud.as_deref(), &format!("rake {task}"))?;

    match app.rake(&task).await {
        Ok(result) => {
            say(result);
            Ok(())
        }
        Err(err) if err.message() == Some(APP_NOT_RUNNING) => Err(CliError::message(format!(
            "Cloud {app} is not running. Cannot run rake task."
        ))),
        Err(err) => Err(cloud_access(err, &app.code_name)),
    }
}

async fn run_ssh(connection: &ConsoleConnection, command: Option<&str>) -> CliResult {
    let status = remote::run_interactive(remote::ssh_command(connection, command)).await?;
    if status != 0 {
        return Err(CliError::Exit(status));
    }
    Ok(())
}

async fn console_connection(
    app: &App,
    server: Option<&str>,
    refusal: &str,
) -> CliResult<ConsoleConnection> {
    match app.console_connection(server).await {
        Ok(connection) => Ok(connection),
        Err(ApiError::Conflict(_)) => Err(CliError::message(refusal)),
        Err(err) if err.is_not_found("virtual_server") => Err(CliError::message(format!(
            "Virtual server '{}' not found or not configured for running console",
            server.unwrap_or_default()
        ))),
        Err(err) => Err(cloud_access(err, &app.code_name)),
    }
}

pub async fn console(ctx: &Context, cloud: CloudArg, server: Option<&str>) -> CliResult {
    let client = ctx.logged_in().await?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "console")?;

    let refusal = format!("Cloud {app} is not running. Cannot run console.");
    let connection = console_connection(&app, server, &refusal).await?;
    run_ssh(&connection, None).await
}

pub async fn dbconsole(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "dbconsole")?;

    let refusal = format!("Cloud {app} wasn't deployed properly. Cannot run dbconsole.");
    let connection = console_connection(&app, None, &refusal).await?;
    run_ssh(&connection, Some("dbconsole")).await
}
