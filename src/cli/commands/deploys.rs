use crate::cli::context::cloud_access;
use crate::cli::shell::{say, say_green};
use crate::cli::{CliError, CliResult, Context, DeploysCommands};

pub async fn run(ctx: &Context, command: DeploysCommands) -> CliResult {
    let client = ctx.logged_in().await?;

    match command {
        DeploysCommands::List(cloud) => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "deploys list")?;
            let logs = app
                .deploy_logs()
                .await
                .map_err(|e| cloud_access(e, &app.code_name))?;

            if logs.is_empty() {
                say("No deploy logs available");
                return Ok(());
            }

            say_green("Available deploy logs");
            for log in logs {
                if log.failed {
                    say(format!("  * {} (failed)", log.created_at));
                } else {
                    say(format!("  * {}", log.created_at));
                }
            }
            Ok(())
        }
        DeploysCommands::Show { log, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "deploys show")?;
            let Some(log) = log else {
                return Err(CliError::message(
                    "Specify log by passing date or by typing 'last'",
                ));
            };

            let content = match app.deploy_log(&log).await {
                Ok(content) => content,
                Err(err) if err.is_not_found("log") => {
                    return Err(CliError::message(format!(
                        "Log not found, list all deploy logs using `shelly deploys list --cloud={app}`"
                    )));
                }
                Err(err) => return Err(cloud_access(err, &app.code_name)),
            };

            say_green(format!("Log for deploy done on {}", content.created_at));
            for (heading, section) in content.sections() {
                say_green(heading);
                say(section);
            }
            Ok(())
        }
    }
}
