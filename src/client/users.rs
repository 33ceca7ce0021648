use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiResult, Client};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collaborator {
    pub email: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub owner: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    user: RegisterUser<'a>,
}

#[derive(Serialize)]
struct RegisterUser<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_key: Option<&'a str>,
}

#[derive(Serialize)]
struct SshKeyRequest<'a> {
    ssh_key: &'a str,
}

#[derive(Serialize)]
struct InvitationRequest<'a> {
    email: &'a str,
}

impl Client {
    /// Exchange email and password for an API token.
    pub async fn login_token(&self, email: &str, password: &str) -> ApiResult<String> {
        let builder = self
            .request(Method::GET, &["token"])?
            .basic_auth(email, Some(password));
        let response: TokenResponse = self.send_json(builder).await?;
        Ok(response.token)
    }

    /// Token of the currently authenticated user. Fails with `Unauthorized`
    /// when the stored token is no longer valid.
    pub async fn fetch_token(&self) -> ApiResult<String> {
        let response: TokenResponse = self.get(&["token"]).await?;
        Ok(response.token)
    }

    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        ssh_key: Option<&str>,
    ) -> ApiResult<()> {
        let request = RegisterRequest {
            user: RegisterUser {
                email,
                password,
                ssh_key,
            },
        };
        self.post_unit(&["users"], &request).await
    }

    pub async fn add_ssh_key(&self, ssh_key: &str) -> ApiResult<()> {
        self.post_unit(&["ssh_keys"], &SshKeyRequest { ssh_key })
            .await
    }

    pub async fn delete_ssh_key(&self, ssh_key: &str) -> ApiResult<()> {
        self.delete_with_body(&["ssh_keys"], &SshKeyRequest { ssh_key })
            .await
    }

    pub async fn collaborations(&self, code_name: &str) -> ApiResult<Vec<Collaborator>> {
        self.get(&["apps", code_name, "collaborations"]).await
    }

    pub async fn send_invitation(&self, code_name: &str, email: &str) -> ApiResult<()> {
        self.post_unit(
            &["apps", code_name, "collaborations"],
            &InvitationRequest { email },
        )
        .await
    }

    pub async fn delete_collaboration(&self, code_name: &str, email: &str) -> ApiResult<()> {
        self.delete(&["apps", code_name, "collaborations", email])
            .await
    }
}
