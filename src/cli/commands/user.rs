use crate::cli::context::cloud_access;
use crate::cli::shell::{ask, say, say_error, say_green};
use crate::cli::{CliError, CliResult, Context, UserCommands};
use crate::client::ApiError;

fn ask_for_email(email: Option<String>) -> CliResult<String> {
    if let Some(email) = email {
        return Ok(email);
    }
    loop {
        let email = ask("Email:")?;
        if !email.is_empty() {
            return Ok(email);
        }
        say_error("Email can't be blank, please try again");
    }
}

pub async fn run(ctx: &Context, command: UserCommands) -> CliResult {
    let client = ctx.logged_in().await?;

    match command {
        UserCommands::List(cloud) => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "user list")?;
            let collaborators = app
                .collaborations()
                .await
                .map_err(|e| cloud_access(e, &app.code_name))?;

            say_green(format!("Cloud {app}:"));
            for collaborator in collaborators.iter().filter(|c| c.active) {
                let owner = if collaborator.owner { " (owner)" } else { "" };
                say(format!("  {}{}", collaborator.email, owner));
            }
            for collaborator in collaborators.iter().filter(|c| !c.active) {
                say(format!("  {} (invited)", collaborator.email));
            }
            Ok(())
        }
        UserCommands::Add { email, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "user add")?;
            let email = ask_for_email(email)?;

            match app.send_invitation(&email).await {
                Ok(()) => {
                    say_green(format!("Sending invitation to {email} to work on {app}"));
                    Ok(())
                }
                Err(ApiError::Validation(payload))
                    if payload
                        .validation_messages()
                        .iter()
                        .any(|m| m.contains("has already been taken")) =>
                {
                    Err(CliError::message(format!(
                        "User {email} is already in the cloud {app}"
                    )))
                }
                Err(err) => Err(cloud_access(err, &app.code_name)),
            }
        }
        UserCommands::Delete { email, cloud } => {
            let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "user delete")?;
            let email = ask_for_email(email)?;

            match app.delete_collaboration(&email).await {
                Ok(()) => {
                    say(format!("User {email} deleted from cloud {app}"));
                    Ok(())
                }
                Err(err) if err.is_not_found("user") => {
                    say_error(format!("User '{email}' not found"));
                    Err(CliError::message(
                        "You can list users with `shelly user list`",
                    ))
                }
                Err(ApiError::Conflict(payload)) => Err(CliError::message(
                    payload
                        .message()
                        .unwrap_or("Cannot remove this user from the cloud"),
                )),
                Err(err) => Err(cloud_access(err, &app.code_name)),
            }
        }
    }
}
