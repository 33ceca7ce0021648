use crate::cli::shell::{ask, ask_password, say, say_error, yes};
use crate::cli::{CliError, CliResult, Context};
use crate::client::{ApiError, VERSION};

pub fn version() {
    say(format!("shelly version {VERSION}"));
}

async fn ask_for_email(ctx: &Context) -> CliResult<String> {
    let guessed = ctx.git().user_email().await;
    let prompt = match &guessed {
        Some(email) => format!("Email ({email} - default):"),
        None => "Email:".to_string(),
    };

    loop {
        let answer = ask(&prompt)?;
        let email = if answer.is_empty() {
            guessed.clone().unwrap_or_default()
        } else {
            answer
        };
        if !email.is_empty() {
            return Ok(email);
        }
        say_error("Email can't be blank, please try again");
    }
}

fn ask_for_password(with_confirmation: bool) -> CliResult<String> {
    loop {
        let password = ask_password("Password:")?;
        if !with_confirmation {
            return Ok(password);
        }

        let confirmation = ask_password("Password confirmation:")?;
        if password.is_empty() {
            say_error("Password can't be blank");
        } else if password == confirmation {
            return Ok(password);
        } else {
            say_error("Password and password confirmation don't match, please type them again");
        }
    }
}

fn ask_for_acceptance_of_terms() -> CliResult {
    if yes("Do you accept the Shelly Cloud Terms of Service? (yes/no)")? {
        Ok(())
    } else {
        Err(CliError::message(
            "You must accept the Shelly Cloud Terms of Service to use Shelly Cloud",
        ))
    }
}

pub async fn register(ctx: &Context, email: Option<String>) -> CliResult {
    let mut user = ctx.user(ctx.client(None)?);
    if let Some(email) = &email {
        say(format!("Registering with email: {email}"));
    }

    user.email = Some(match email {
        Some(email) => email,
        None => ask_for_email(ctx).await?,
    });
    user.password = Some(ask_for_password(true)?);
    ask_for_acceptance_of_terms()?;

    // validation errors are printed one per line by the generic handler
    user.register().await?;

    if user.ssh_key_exists() {
        say(format!(
            "Uploading your public SSH key from {}",
            user.ssh_key_path().display()
        ));
    } else {
        say_error(format!(
            "No such file or directory - {}",
            user.ssh_key_path().display()
        ));
        say_error("Use ssh-keygen to generate ssh key pair, after that use: `shelly login`");
    }
    say("Successfully registered!");
    say("Check you mailbox for email address confirmation");
    Ok(())
}

pub async fn login(ctx: &Context, email: Option<String>) -> CliResult {
    let mut user = ctx.user(ctx.client(None)?);
    if !user.ssh_key_exists() {
        say_error(format!(
            "No such file or directory - {}",
            user.ssh_key_path().display()
        ));
        return Err(CliError::message("Use ssh-keygen to generate ssh key pair"));
    }

    user.email = Some(match email {
        Some(email) => email,
        None => ask_for_email(ctx).await?,
    });
    user.password = Some(ask_for_password(false)?);

    if let Err(err) = user.login().await {
        if let Some(ApiError::Unauthorized(payload)) = err.downcast_ref::<ApiError>() {
            say_error("Wrong email or password");
            say_error("You can reset password by using link:");
            if let Some(url) = payload.get("url") {
                say_error(url);
            }
            return Err(CliError::Exit(1));
        }
        return Err(err.into());
    }
    say("Login successful");

    user.upload_ssh_key().await?;
    say("Uploading your public SSH key");

    super::clouds::print_clouds(user.client()).await
}

pub async fn logout(ctx: &Context) -> CliResult {
    let user = ctx.user(ctx.logged_in().await?);
    if user.delete_ssh_key().await? {
        say("Your public SSH key has been removed from Shelly Cloud");
    }
    if user.delete_credentials()? {
        say("You have been successfully logged out");
    }
    Ok(())
}
