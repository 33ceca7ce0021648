use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::client::{ApiResult, AppSummary, Client};
use crate::config::Credentials;

const SSH_PUBLIC_KEY: &str = "id_rsa.pub";

/// The account working with the CLI.
#[derive(Debug, Clone)]
pub struct User {
    client: Client,
    config_dir: PathBuf,
    ssh_dir: PathBuf,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `~/.ssh`
pub fn default_ssh_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
}

impl User {
    pub fn new(client: Client, config_dir: &Path) -> Self {
        Self::with_ssh_dir(client, config_dir, &default_ssh_dir())
    }

    pub fn with_ssh_dir(client: Client, config_dir: &Path, ssh_dir: &Path) -> Self {
        Self {
            client,
            config_dir: config_dir.to_path_buf(),
            ssh_dir: ssh_dir.to_path_buf(),
            email: None,
            password: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn ssh_key_path(&self) -> PathBuf {
        self.ssh_dir.join(SSH_PUBLIC_KEY)
    }

    pub fn ssh_key_exists(&self) -> bool {
        self.ssh_key_path().is_file()
    }

    pub fn ssh_key(&self) -> Result<String> {
        let path = self.ssh_key_path();
        let key = std::fs::read_to_string(&path)
            .with_context(|| format!("No such file or directory - {}", path.display()))?;
        Ok(key.trim().to_string())
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let email = self.email.as_deref().context("Email is required")?;
        let password = self.password.as_deref().context("Password is required")?;
        Ok((email, password))
    }

    /// Create the account, sending the public SSH key along when present.
    pub async fn register(&self) -> Result<()> {
        let (email, password) = self.credentials()?;
        let ssh_key = if self.ssh_key_exists() {
            Some(self.ssh_key()?)
        } else {
            None
        };
        self.client
            .register_user(email, password, ssh_key.as_deref())
            .await?;
        Ok(())
    }

    /// Exchange email and password for a token, persist it and authenticate
    /// further calls with it.
    pub async fn login(&mut self) -> Result<()> {
        let (email, password) = self.credentials()?;
        let token = self.client.login_token(email, password).await?;

        Credentials {
            email: email.to_string(),
            token: token.clone(),
        }
        .save(&self.config_dir)?;
        debug!(email, "Logged in");

        self.client = self.client.with_token(token);
        Ok(())
    }

    pub async fn token(&self) -> ApiResult<String> {
        self.client.fetch_token().await
    }

    pub async fn apps(&self) -> ApiResult<Vec<AppSummary>> {
        self.client.apps().await
    }

    pub async fn upload_ssh_key(&self) -> Result<()> {
        let key = self.ssh_key()?;
        self.client.add_ssh_key(&key).await?;
        Ok(())
    }

    /// Returns false when there is no local key to remove.
    pub async fn delete_ssh_key(&self) -> Result<bool> {
        if !self.ssh_key_exists() {
            return Ok(false);
        }
        let key = self.ssh_key()?;
        self.client.delete_ssh_key(&key).await?;
        Ok(true)
    }

    pub fn delete_credentials(&self) -> Result<bool> {
        Credentials::delete(&self.config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use crate::client::ApiError;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        config_dir: PathBuf,
        ssh_dir: PathBuf,
    }

    fn fixture(with_key: bool) -> Fixture {
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("shelly");
        let ssh_dir = root.path().join("ssh");
        std::fs::create_dir_all(&ssh_dir).unwrap();
        if with_key {
            std::fs::write(ssh_dir.join("id_rsa.pub"), "ssh-rsa AAAA key\n").unwrap();
        }
        Fixture {
            _root: root,
            config_dir,
            ssh_dir,
        }
    }

    #[test]
    fn test_ssh_key_path() {
        let f = fixture(true);
        let user = User::with_ssh_dir(
            Client::new(
                "https://api.example.com",
                None,
                std::time::Duration::from_secs(5),
            )
            .unwrap(),
            &f.config_dir,
            &f.ssh_dir,
        );
        assert_eq!(user.ssh_key_path(), f.ssh_dir.join("id_rsa.pub"));
        assert!(user.ssh_key_exists());
        assert_eq!(user.ssh_key().unwrap(), "ssh-rsa AAAA key");
    }

    #[tokio::test]
    async fn test_register_sends_ssh_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/users").json_body(json!({
                    "user": {
                        "email": "bob@example.com",
                        "password": "secret",
                        "ssh_key": "ssh-rsa AAAA key"
                    }
                }));
                then.status(201).json_body(json!({}));
            })
            .await;

        let f = fixture(true);
        let mut user = User::with_ssh_dir(test_client(&server), &f.config_dir, &f.ssh_dir);
        user.email = Some("bob@example.com".to_string());
        user.password = Some("secret".to_string());
        user.register().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_saves_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/token");
                then.status(200).json_body(json!({"token": "new-token"}));
            })
            .await;

        let f = fixture(true);
        let mut user = User::with_ssh_dir(test_client(&server), &f.config_dir, &f.ssh_dir);
        user.email = Some("bob@example.com".to_string());
        user.password = Some("secret".to_string());
        user.login().await.unwrap();

        let saved = Credentials::load(&f.config_dir).unwrap().unwrap();
        assert_eq!(saved.email, "bob@example.com");
        assert_eq!(saved.token, "new-token");
        assert_eq!(user.client().token(), Some("new-token"));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/token");
                then.status(401)
                    .json_body(json!({"url": "https://example.com/reset"}));
            })
            .await;

        let f = fixture(true);
        let mut user = User::with_ssh_dir(test_client(&server), &f.config_dir, &f.ssh_dir);
        user.email = Some("bob@example.com".to_string());
        user.password = Some("wrong".to_string());
        let err = user.login().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Unauthorized(_))
        ));
        assert!(Credentials::load(&f.config_dir).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_ssh_key_without_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/ssh_keys");
                then.status(204);
            })
            .await;

        let f = fixture(false);
        let user = User::with_ssh_dir(test_client(&server), &f.config_dir, &f.ssh_dir);
        assert!(!user.delete_ssh_key().await.unwrap());
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_delete_ssh_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/ssh_keys")
                    .json_body(json!({"ssh_key": "ssh-rsa AAAA key"}));
                then.status(204);
            })
            .await;

        let f = fixture(true);
        let user = User::with_ssh_dir(test_client(&server), &f.config_dir, &f.ssh_dir);
        assert!(user.delete_ssh_key().await.unwrap());
        mock.assert_async().await;
    }
}
