use crate::cli::context::cloud_access;
use crate::cli::shell::{print_table, say, say_error, say_green, say_new_line, yes, Progress};
use crate::cli::{BackupCommands, CliError, CliResult, Context};
use crate::client::ApiError;
use crate::models::app::valid_databases;
use crate::models::App;

fn backup_not_found() -> CliError {
    say_error("Backup not found");
    say("You can list available backups with `shelly backup list` command");
    CliError::Exit(1)
}

/// Shared handling of errors from backup endpoints.
fn backup_error(err: ApiError, app: &App) -> CliError {
    match err {
        err if err.is_not_found("database_backup") => backup_not_found(),
        ApiError::Conflict(payload) => CliError::message(
            payload
                .message()
                .unwrap_or("Backup cannot be processed right now"),
        ),
        err => cloud_access(err, &app.code_name),
    }
}

pub async fn run(ctx: &Context, command: BackupCommands) -> CliResult {
    let client = ctx.logged_in().await?;

    match command {
        BackupCommands::List(cloud) => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "backup list")?;
            let backups = app
                .database_backups()
                .await
                .map_err(|e| backup_error(e, &app))?;

            if backups.is_empty() {
                say("No database backups available");
                return Ok(());
            }

            say_green("Available backups:");
            say_new_line();
            let mut rows = vec![("Filename".to_string(), "|  Size  |  State".to_string())];
            rows.extend(backups.iter().map(|backup| {
                (
                    backup.filename.clone(),
                    format!(
                        "|  {}  |  {}",
                        backup.human_size,
                        backup.state.replace('_', " ")
                    ),
                )
            }));
            print_table(&rows, 2);
            Ok(())
        }
        BackupCommands::Get { handler, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "backup get")?;
            let handler = handler.unwrap_or_else(|| "last".to_string());
            let backup = app
                .database_backup(&handler)
                .await
                .map_err(|e| backup_error(e, &app))?;

            let destination = backup.destination(&ctx.cwd).map_err(anyhow::Error::from)?;
            let mut progress = Progress::new(backup.size);
            backup
                .download(app.client(), &ctx.cwd, |n| progress.advance(n))
                .await?;
            progress.finish();

            let saved = destination.file_name().unwrap_or_default().to_string_lossy();
            say_new_line();
            say_green(format!("Backup file saved to {saved}"));
            Ok(())
        }
        BackupCommands::Create { kinds, cloud } => {
            let app = ctx.multiple_clouds(
                &client,
                cloud.cloud.as_deref(),
                "backup create [DB_KIND]",
            )?;

            let kinds = if kinds.is_empty() {
                if !ctx.cloudfile().present() {
                    say_error(
                        "Cloudfile must be present in current working directory or specify database kind with:",
                    );
                    return Err(CliError::message("`shelly backup create DB_KIND`"));
                }
                let databases = app.backup_databases();
                if databases.is_empty() {
                    say_error(format!(
                        "Cloud {app} has no databases that can be backed up in Cloudfile"
                    ));
                    return Err(CliError::message(
                        "Specify database kind with: `shelly backup create DB_KIND`",
                    ));
                }
                databases
            } else {
                if !valid_databases(kinds.as_slice()) {
                    return Err(CliError::message(
                        "Try `shelly help backup create` for more information",
                    ));
                }
                kinds
            };

            match app.request_backup(kinds.as_slice()).await {
                Ok(()) => {
                    say_green(
                        "Backup requested. It can take up to several minutes for the backup process to finish.",
                    );
                    Ok(())
                }
                // validation messages are printed by the generic handler
                Err(err @ ApiError::Validation(_)) => Err(err.into()),
                Err(err) => Err(backup_error(err, &app)),
            }
        }
        BackupCommands::Restore { filename, cloud } => {
            let app = ctx.multiple_clouds(
                &client,
                cloud.cloud.as_deref(),
                "backup restore FILENAME",
            )?;
            let backup = app
                .database_backup(&filename)
                .await
                .map_err(|e| backup_error(e, &app))?;

            say(format!(
                "You are about restore database {} for cloud {} to state from {}",
                backup.kind, backup.code_name, backup.filename
            ));
            say_new_line();
            if !yes("I want to restore the database (yes/no):")? {
                say_new_line();
                return Err(CliError::Exit(1));
            }

            app.restore_backup(&filename)
                .await
                .map_err(|e| backup_error(e, &app))?;
            say_new_line();
            say("Restore has been scheduled. Wait a few minutes till database is restored.");
            Ok(())
        }
    }
}
