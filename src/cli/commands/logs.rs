use chrono::NaiveDate;
use std::io::Write;

use crate::cli::context::cloud_access;
use crate::cli::shell::{say, say_green, Progress};
use crate::cli::{CliError, CliResult, Context, LogsArgs, LogsCommands};
use crate::client::LogsQuery;
use crate::models::{download_path, App};

const DEFAULT_LIMIT: u32 = 100;

/// Non-positive limits fall back to the default.
fn effective_limit(limit: i64) -> u32 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        u32::try_from(limit).unwrap_or(u32::MAX)
    }
}

pub async fn run(ctx: &Context, args: LogsArgs) -> CliResult {
    let client = ctx.logged_in().await?;
    ctx.cloudfile_present()?;

    if let Some(LogsCommands::Get { date, cloud }) = args.command {
        let app = ctx.multiple_clouds(&client, cloud.cloud.as_deref(), "logs get")?;
        return download(ctx, &app, &date).await;
    }

    let app = ctx.multiple_clouds(&client, args.cloud.cloud.as_deref(), "logs")?;
    let query = LogsQuery {
        limit: Some(effective_limit(args.limit)),
        source: args.source,
        from: args.from,
        date: None,
    };

    let page = app
        .application_logs(&query)
        .await
        .map_err(|e| cloud_access(e, &app.code_name))?;
    for entry in &page.entries {
        say(entry);
    }

    if args.tail {
        let mut stdout = std::io::stdout();
        // a closed stdout (`shelly logs --tail | head`) ends the tail quietly
        app.application_logs_tail(|chunk| {
            stdout.write_all(chunk)?;
            stdout.flush()
        })
        .await?;
    }
    Ok(())
}

async fn download(ctx: &Context, app: &App, date: &str) -> CliResult {
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(CliError::message("DATE should be in format YYYY-MM-DD"));
    }

    let attributes = match app.download_application_logs_attributes(date).await {
        Ok(attributes) => attributes,
        Err(err) if err.is_not_found("log") => {
            return Err(CliError::message(format!("Log file for {date} not found")));
        }
        Err(err) => return Err(cloud_access(err, &app.code_name)),
    };

    let destination =
        download_path(&ctx.cwd, &attributes.filename).map_err(anyhow::Error::from)?;
    let mut progress = Progress::new(attributes.size);
    app.client()
        .download_application_logs(&attributes, &destination, |n| progress.advance(n))
        .await?;
    progress.finish();

    let saved = destination.file_name().unwrap_or_default().to_string_lossy();
    say_green(format!("Log file saved to {saved}"));
    Ok(())
}
