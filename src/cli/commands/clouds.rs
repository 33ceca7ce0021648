use tracing::debug;

use crate::cli::context::{cloud_access, no_access, overwrite_remote};
use crate::cli::shell::{ask, print_table, say, say_error, say_green, say_new_line, yes};
use crate::cli::{AddArgs, CloudArg, CliError, CliResult, Context};
use crate::client::{ApiError, Client};
use crate::models::app::{valid_databases, DATABASE_KINDS, DEFAULT_DATABASE};
use crate::models::App;

const FAILED_STATES: &[&str] = &["deploy_failed", "configuration_failed"];

fn humanize_state(state: &str) -> String {
    state.replace('_', " ")
}

fn deploy_log_hint(code_name: &str, state: &str) -> String {
    if FAILED_STATES.contains(&state) {
        format!(" (deployment log: `shelly deploys show last -c {code_name}`)")
    } else {
        String::new()
    }
}

/// Ask to confirm a destructive step; declining aborts the command.
fn confirm(prompt: &str) -> CliResult {
    if yes(prompt)? {
        Ok(())
    } else {
        say_new_line();
        Err(CliError::Exit(1))
    }
}

// ============================================================================
// add
// ============================================================================

fn ask_for_code_name(default: &str) -> CliResult<String> {
    let answer = ask(&format!("Cloud code name ({default} - default):"))?;
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer
    })
}

fn split_databases(answer: &str) -> Vec<String> {
    answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|kind| !kind.is_empty())
        .map(str::to_string)
        .collect()
}

fn ask_for_databases() -> CliResult<Vec<String>> {
    let kinds = DATABASE_KINDS.join(", ");
    let mut answer = ask(&format!(
        "Which database do you want to use {kinds} ({DEFAULT_DATABASE} - default):"
    ))?;

    loop {
        let databases = split_databases(&answer);
        if valid_databases(databases.as_slice()) {
            if databases.is_empty() {
                return Ok(vec![DEFAULT_DATABASE.to_string()]);
            }
            return Ok(databases);
        }
        answer = ask(&format!("Unknown database kind. Supported are: {kinds}:"))?;
    }
}

fn info_adding_cloudfile_to_repository() {
    say_new_line();
    say_green("Project is now configured for use with Shell Cloud:");
    say_green("You can review changes using");
    say("  git status");
}

fn info_deploying_to_shellycloud(app: &App) {
    say_new_line();
    say_green("When you make sure all settings are correct please issue following commands:");
    say("  git add .");
    say("  git commit -m \"Application added to Shelly Cloud\"");
    say("  git push");
    say_new_line();
    say_green("Deploy to your cloud using:");
    say(format!("  git push {app} master"));
    say_new_line();
}

pub async fn add(ctx: &Context, args: AddArgs) -> CliResult {
    let client = ctx.logged_in().await?;
    let git = ctx.inside_git_repository().await?;

    if let Some(databases) = &args.databases {
        if !valid_databases(databases.as_slice()) {
            return Err(CliError::message(
                "Try `shelly help add` for more information",
            ));
        }
    }

    let cloudfile = ctx.cloudfile();
    let code_name = match args.code_name {
        Some(code_name) => code_name,
        None => ask_for_code_name(&App::guess_code_name(&ctx.cwd, &cloudfile)?)?,
    };
    let databases = match args.databases {
        Some(databases) => databases,
        None => ask_for_databases()?,
    };

    let mut app = App::new(client.clone(), code_name);
    app.set_databases(databases.as_slice());
    app.size = args.size;
    app.redeem_code = args.redeem_code;
    app.organization = args.organization;
    app.zone_name = args.zone;

    match app.create().await {
        Ok(()) => {}
        Err(ApiError::Validation(payload)) => {
            for message in payload.validation_messages() {
                say_error(message);
            }
            say_new_line();
            say_error("Fix erros in the below command and type it again to create your cloud");
            return Err(CliError::message(format!(
                "shelly add --code-name={} --databases={} --size={}",
                app.code_name,
                databases.join(","),
                app.size
            )));
        }
        Err(err) => return Err(err.into()),
    }

    if overwrite_remote(&app, &git).await? {
        say_green(format!(
            "Adding remote {} {}",
            app,
            app.git_url.as_deref().unwrap_or_default()
        ));
        app.add_git_remote(&git).await?;
    } else {
        say("You have to manually add git remote:");
        say(format!(
            "`git remote add NAME {}`",
            app.git_url.as_deref().unwrap_or_default()
        ));
    }

    say_green("Creating Cloudfile");
    app.create_cloudfile(&cloudfile)?;

    if app.trial {
        say_new_line();
        say_green("Billing information");
        say("Cloud created with 20 Euro credit.");
        say("Remember to provide billing details before trial ends.");
        let shellyapp = client.shellyapp_url().await?;
        say(format!(
            "{}/apps/{}/billing/edit",
            shellyapp.trim_end_matches('/'),
            app.code_name
        ));
    }

    info_adding_cloudfile_to_repository();
    info_deploying_to_shellycloud(&app);
    Ok(())
}

// ============================================================================
// list / ip / info
// ============================================================================

/// Clouds table printed by `list` and after logging in.
pub async fn print_clouds(client: &Client) -> CliResult {
    let apps = client.apps().await?;
    if apps.is_empty() {
        say_green("You have no clouds yet");
        return Ok(());
    }

    say_green("You have following clouds available:");
    let rows: Vec<(String, String)> = apps
        .iter()
        .map(|app| {
            let state = app.state.as_str();
            (
                app.code_name.clone(),
                format!(
                    "|  {}{}",
                    humanize_state(state),
                    deploy_log_hint(&app.code_name, state)
                ),
            )
        })
        .collect();
    print_table(&rows, 2);
    Ok(())
}

pub async fn list(ctx: &Context) -> CliResult {
    let client = ctx.logged_in().await?;
    print_clouds(&client).await
}

pub async fn ip(ctx: &Context) -> CliResult {
    let client = ctx.logged_in().await?;
    let cloudfile = ctx.cloudfile_present()?;

    for cloud in cloudfile.clouds()? {
        let app = App::new(client.clone(), cloud.as_str());
        let (web, mail) = match app.attributes().await {
            Ok(attributes) => (
                attributes.web_server_ip.clone(),
                attributes.mail_server_ip.clone(),
            ),
            Err(err) if err.is_not_found("cloud") => {
                say_error(no_access(&cloud));
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        say_green(format!("Cloud {cloud}:"));
        say(format!("  Web server IP: {}", web.unwrap_or_default()));
        say(format!("  Mail server IP: {}", mail.unwrap_or_default()));
    }
    Ok(())
}

pub async fn info(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "info")?;

    let attributes = app
        .attributes()
        .await
        .map_err(|e| cloud_access(e, &app.code_name))?;
    let state = attributes.state.as_deref().unwrap_or_default();
    let hint = deploy_log_hint(&app.code_name, state);

    let title = format!("Cloud {app}:");
    if hint.is_empty() {
        say_green(title);
    } else {
        say_error(title);
    }
    say(format!("  State: {}{}", humanize_state(state), hint));
    say_new_line();

    let git_info = &attributes.git_info;
    say(format!(
        "  Deployed commit sha: {}",
        git_info.deployed_commit_sha.as_deref().unwrap_or_default()
    ));
    say(format!(
        "  Deployed commit message: {}",
        git_info.deployed_commit_message.as_deref().unwrap_or_default()
    ));
    say(format!(
        "  Deployed by: {}",
        git_info.deployed_push_author.as_deref().unwrap_or_default()
    ));
    say_new_line();
    say(format!(
        "  Repository URL: {}",
        git_info.repository_url.as_deref().unwrap_or_default()
    ));
    say(format!(
        "  Web server IP: {}",
        attributes.web_server_ip.as_deref().unwrap_or_default()
    ));
    say(format!(
        "  Mail server IP: {}",
        attributes.mail_server_ip.as_deref().unwrap_or_default()
    ));

    let git = ctx.git();
    if app.deployed().await? && git.inside_repository().await {
        match app.pending_commits(&git).await {
            Ok(commits) => {
                say_new_line();
                say(format!("  Pending commits: {}", commits.len()));
                for commit in commits {
                    say(format!("    {commit}"));
                }
            }
            // the deployed commit may not exist locally
            Err(err) => debug!(error = %err, "Could not list pending commits"),
        }
    }
    Ok(())
}

// ============================================================================
// start / stop / redeploy
// ============================================================================

async fn start_conflict(app: &App, state: Option<&str>) -> CliResult {
    match state {
        Some("running") => {
            say_error(format!("Not starting: cloud '{app}' is already running"));
        }
        Some("deploying") | Some("configuring") => {
            say_error(format!("Not starting: cloud '{app}' is currently deploying"));
        }
        Some("no_code") => {
            say_error("Not starting: no source code provided");
            say_error("Push source code using:");
            say(format!("  git push {app} master"));
        }
        Some("deploy_failed") | Some("configuration_failed") => {
            say_error("Not starting: deployment failed");
            say_error("Support has been notified");
            say_error(format!(
                "Check `shelly deploys show last --cloud {app}` for reasons of failure"
            ));
        }
        Some("not_enough_resources") => {
            say_error("Sorry, There are no resources for your servers.");
            say_error("We have been notified about it. We will be adding new resources shortly");
        }
        Some("no_billing") => {
            say_error(format!("Please fill in billing details to start {app}."));
            let shellyapp = app.client().shellyapp_url().await?;
            say_error(format!("Visit: {}", app.edit_billing_url(&shellyapp)));
        }
        Some("payment_declined") => {
            say_error(format!(
                "Not starting. Invoice for cloud '{app}' was declined."
            ));
        }
        other => {
            debug!(state = ?other, "Unexpected conflict state");
            say_error(format!("Not starting: cloud '{app}' is {}", other.unwrap_or("busy")));
        }
    }
    Err(CliError::Exit(1))
}

pub async fn start(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    ctx.cloudfile_present()?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "start")?;

    match app.start().await {
        Ok(deployment) => {
            debug!(deployment = %deployment, "Start requested");
            say_green(format!("Starting cloud {app}."));
            say("This can take up to 10 minutes.");
            say("Check status with: `shelly list`");
            Ok(())
        }
        Err(err @ ApiError::Conflict(_)) => start_conflict(&app, err.state()).await,
        Err(err) => Err(cloud_access(err, &app.code_name)),
    }
}

pub async fn stop(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    ctx.cloudfile_present()?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "stop")?;

    confirm(&format!(
        "Are you sure you want to shut down '{app}' cloud (yes/no):"
    ))?;
    app.stop()
        .await
        .map_err(|e| cloud_access(e, &app.code_name))?;

    say_new_line();
    say(format!("Cloud '{app}' stopped"));
    Ok(())
}

pub async fn redeploy(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "redeploy")?;

    match app.redeploy().await {
        Ok(_) => {
            say_green(format!("Redeploying your application for cloud '{app}'"));
            Ok(())
        }
        Err(err @ ApiError::Conflict(_)) => match err.state().map(str::to_string).as_deref() {
            Some("deploying") | Some("configuring") => Err(CliError::message(
                "Your application is being redeployed at the moment",
            )),
            Some("no_code") | Some("no_billing") | Some("turned_off") => {
                say_error(format!("Cloud {app} is not running"));
                say(format!("Start your cloud with `shelly start --cloud {app}`"));
                Err(CliError::Exit(1))
            }
            _ => Err(err.into()),
        },
        Err(err) => Err(cloud_access(err, &app.code_name)),
    }
}

// ============================================================================
// delete / setup
// ============================================================================

pub async fn delete(ctx: &Context, cloud: CloudArg) -> CliResult {
    let client = ctx.logged_in().await?;
    let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "delete")?;

    say(format!("You are about to delete application: {app}."));
    say("Press Control-C at any moment to cancel.");
    say("Please confirm each question by typing yes and pressing Enter.");
    say_new_line();
    confirm("I want to delete all files stored on Shelly Cloud (yes/no):")?;
    confirm("I want to delete all database data stored on Shelly Cloud (yes/no):")?;
    confirm("I want to delete the application (yes/no):")?;

    app.delete()
        .await
        .map_err(|e| cloud_access(e, &app.code_name))?;
    say_new_line();
    say("Scheduling application delete - done");

    let git = ctx.git();
    if git.inside_repository().await {
        if let Err(err) = app.remove_git_remote(&git).await {
            debug!(error = %err, "Git remote was not removed");
        }
        say("Removing git remote - done");
    } else {
        say("Missing git remote");
    }
    Ok(())
}

pub async fn setup(ctx: &Context) -> CliResult {
    let client = ctx.logged_in().await?;
    let git = ctx.inside_git_repository().await?;
    let cloudfile = ctx.cloudfile_present()?;

    say("Investigating Cloudfile");
    for cloud in cloudfile.clouds()? {
        let mut app = App::new(client.clone(), cloud.as_str());
        say_green(format!("Adding {app} cloud"));

        let git_info = app
            .git_info()
            .await
            .map_err(|e| cloud_access(e, &cloud))?;
        app.git_url = git_info.repository_url;
        let url = app.git_url.clone().unwrap_or_default();

        if overwrite_remote(&app, &git).await? {
            say(format!("git remote add {app} {url}"));
            app.add_git_remote(&git).await?;
            // an empty remote or an existing branch must not stop the setup
            say(format!("git fetch {app}"));
            if let Err(err) = app.git_fetch_remote(&git).await {
                debug!(error = %err, cloud = %app, "git fetch failed");
            }
            say(format!("git checkout -b {app} --track {app}/master"));
            if let Err(err) = app.git_add_tracking_branch(&git).await {
                debug!(error = %err, cloud = %app, "Tracking branch not created");
            }
        } else {
            say("You have to manually add remote:");
            say(format!("`git remote add {app} {url}`"));
            say(format!("`git fetch {app}`"));
            say(format!("`git checkout -b {app} --track {app}/master`"));
        }
        say_new_line();
    }

    say_green("Your application is set up.");
    Ok(())
}
