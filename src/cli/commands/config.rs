use anyhow::Context as _;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::cli::context::{cloud_access, no_access};
use crate::cli::shell::{say, say_error, say_green, yes};
use crate::cli::{CliError, CliResult, ConfigCommands, Context};
use crate::client::{ApiError, ConfigFile};
use crate::models::App;

fn print_configs(configs: &[ConfigFile]) {
    for config in configs {
        say(format!("  * {}", config.path));
    }
}

fn redeploy_hint(app: &App) {
    say("To make changes to running application redeploy it using:");
    say(format!("`shelly redeploy --cloud {app}`"));
}

fn require_path(path: Option<String>, message: &str) -> CliResult<String> {
    path.ok_or_else(|| CliError::message(message))
}

fn config_error(err: ApiError, app: &App, path: &str) -> CliError {
    if err.is_not_found("config") {
        say_error(format!("Config '{path}' not found"));
        return CliError::message(format!(
            "You can list available config files with `shelly config list --cloud {app}`"
        ));
    }
    cloud_access(err, &app.code_name)
}

/// Let the user edit `content` in `$EDITOR` and return the result.
async fn open_editor(path: &str, content: &str) -> CliResult<String> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.trim().is_empty())
        .ok_or_else(|| CliError::message("Please set EDITOR environment variable"))?;

    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config".to_string());
    let file = tempfile::Builder::new()
        .prefix("shelly-")
        .suffix(&format!("-{name}"))
        .tempfile()
        .context("Failed to create temporary file")?;
    std::fs::write(file.path(), content).context("Failed to write temporary file")?;

    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or_default();
    let mut cmd = Command::new(program);
    cmd.args(words).arg(file.path());
    debug!(command = ?cmd.as_std(), "Opening editor");

    let status = cmd
        .status()
        .await
        .with_context(|| format!("Failed to run editor: {editor}"))?;
    if !status.success() {
        return Err(CliError::message(format!("Editor exited with {status}")));
    }

    Ok(std::fs::read_to_string(file.path()).context("Failed to read edited file")?)
}

pub async fn run(ctx: &Context, command: ConfigCommands) -> CliResult {
    let client = ctx.logged_in().await?;

    match command {
        ConfigCommands::List(cloud) => {
            let clouds = match cloud.cloud {
                Some(cloud) => vec![cloud],
                None => ctx.cloudfile_present()?.clouds()?,
            };

            for code_name in clouds {
                let app = App::new(client.clone(), code_name.as_str());
                let configs = match app.configs().await {
                    Ok(configs) => configs,
                    Err(err) if err.is_not_found("cloud") => {
                        say_error(no_access(&code_name));
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };

                if configs.is_empty() {
                    say(format!("Cloud {code_name} has no configuration files"));
                    continue;
                }

                say_green(format!("Configuration files for {code_name}"));
                let (custom, generated): (Vec<_>, Vec<_>) =
                    configs.into_iter().partition(|c| c.created_by_user);
                if custom.is_empty() {
                    say("You have no custom configuration files.");
                } else {
                    say("Custom configuration files:");
                    print_configs(&custom);
                }
                if !generated.is_empty() {
                    say("Following files are created by Shelly Cloud:");
                    print_configs(&generated);
                }
            }
            Ok(())
        }
        ConfigCommands::Show { path, cloud } => {
            let path = require_path(path, "No configuration file specified")?;
            let app =
                ctx.multiple_clouds(&client, cloud.cloud.as_deref(), &format!("show {path}"))?;
            let config = app
                .config(&path)
                .await
                .map_err(|e| config_error(e, &app, &path))?;

            say_green(format!("Content of {}:", config.path));
            say(config.content.unwrap_or_default());
            Ok(())
        }
        ConfigCommands::Create { path, cloud } => {
            let path = require_path(path, "No path specified")?;
            let content = open_editor(&path, "").await?;
            let app =
                ctx.multiple_clouds(&client, cloud.cloud.as_deref(), &format!("create {path}"))?;
            app.create_config(&path, &content)
                .await
                .map_err(|e| cloud_access(e, &app.code_name))?;

            say_green(format!("File '{path}' created."));
            redeploy_hint(&app);
            Ok(())
        }
        ConfigCommands::Edit { path, cloud } => {
            let path = require_path(path, "No configuration file specified")?;
            let app =
                ctx.multiple_clouds(&client, cloud.cloud.as_deref(), &format!("edit {path}"))?;
            let config = app
                .config(&path)
                .await
                .map_err(|e| config_error(e, &app, &path))?;

            let content =
                open_editor(&config.path, config.content.as_deref().unwrap_or_default()).await?;
            app.update_config(&path, &content)
                .await
                .map_err(|e| config_error(e, &app, &path))?;

            say_green(format!("File '{}' updated.", config.path));
            redeploy_hint(&app);
            Ok(())
        }
        ConfigCommands::Delete { path, cloud } => {
            let path = require_path(path, "No configuration file specified")?;
            let app =
                ctx.multiple_clouds(&client, cloud.cloud.as_deref(), &format!("delete {path}"))?;

            if !yes(&format!(
                "Are you sure you want to delete '{path}' (yes/no): "
            ))? {
                say("File not deleted");
                return Ok(());
            }

            app.delete_config(&path)
                .await
                .map_err(|e| config_error(e, &app, &path))?;
            say_green(format!("File '{path}' deleted."));
            redeploy_hint(&app);
            Ok(())
        }
    }
}
