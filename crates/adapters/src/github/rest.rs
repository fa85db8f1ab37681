// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub REST API client authenticated as a GitHub App installation.

use super::{
    CommitStatus, Contents, DirEntry, GithubClient, GithubError, PullInfo, TokenRequest,
};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Cached default-scope installation token used for ordinary API calls
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// GitHub REST client.
///
/// API calls authenticate with a per-installation token minted from an RS256
/// app JWT; tokens are cached until shortly before they expire. Job-scoped
/// tokens from [`GithubClient::create_token`] are never cached.
#[derive(Clone)]
pub struct RestGithub {
    http: reqwest::Client,
    base_url: String,
    app_id: u64,
    private_key: String,
    tokens: Arc<Mutex<HashMap<u64, CachedToken>>>,
}

impl RestGithub {
    pub fn new(app_id: u64, private_key: String) -> Self {
        Self::with_base_url(app_id, private_key, DEFAULT_BASE_URL.to_string())
    }

    /// Point the client at a different API root (tests)
    pub fn with_base_url(app_id: u64, private_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            app_id,
            private_key,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Short-lived app JWT used only to mint installation tokens
    fn app_jwt(&self) -> Result<String, GithubError> {
        #[derive(serde::Serialize)]
        struct Claims {
            iat: u64,
            exp: u64,
            iss: String,
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            // backdated to absorb clock drift
            iat: now.saturating_sub(60),
            exp: now + 9 * 60,
            iss: self.app_id.to_string(),
        };

        let key = jsonwebtoken::EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| GithubError::Auth(format!("invalid app private key: {e}")))?;
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| GithubError::Auth(format!("failed to sign app jwt: {e}")))
    }

    async fn mint_token(
        &self,
        installation_id: u64,
        request: &TokenRequest,
    ) -> Result<String, GithubError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }

        let jwt = self.app_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url, installation_id
        );
        let mut body = serde_json::Map::new();
        if !request.repositories.is_empty() {
            body.insert("repositories".into(), request.repositories.clone().into());
        }
        if !request.permissions.is_empty() {
            body.insert(
                "permissions".into(),
                serde_json::to_value(&request.permissions)
                    .map_err(|e| GithubError::Decode(e.to_string()))?,
            );
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(jwt)
            .header(USER_AGENT, "bender")
            .header(ACCEPT, "application/vnd.github+json")
            .json(&serde_json::Value::Object(body))
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.token)
    }

    /// Default-scope token for API calls, cached per installation
    async fn api_token(&self, installation_id: u64) -> Result<String, GithubError> {
        {
            let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = tokens.get(&installation_id) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.mint_token(installation_id, &TokenRequest::default()).await?;
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(
            installation_id,
            CachedToken {
                token: token.clone(),
                // installation tokens live one hour; refresh well before that
                expires_at: Instant::now() + Duration::from_secs(50 * 60),
            },
        );
        Ok(token)
    }

    async fn request(
        &self,
        installation_id: u64,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, GithubError> {
        let token = self.api_token(installation_id).await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header(USER_AGENT, "bender")
            .header(ACCEPT, "application/vnd.github+json"))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, GithubError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(GithubError::NotFound);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GithubError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

#[derive(Deserialize)]
struct WireDirEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct WireFile {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WirePull {
    number: u64,
    base: WirePullBase,
    head: WirePullHead,
}

#[derive(Deserialize)]
struct WirePullBase {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Deserialize)]
struct WirePullHead {
    sha: String,
    repo: WirePullHeadRepo,
}

#[derive(Deserialize)]
struct WirePullHeadRepo {
    clone_url: String,
    owner: WireAccount,
}

#[derive(Deserialize)]
struct WireAccount {
    login: String,
}

#[async_trait]
impl GithubClient for RestGithub {
    async fn get_contents(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Contents, GithubError> {
        let response = self
            .request(
                installation_id,
                Method::GET,
                &format!("/repos/{owner}/{repo}/contents/{path}"),
            )
            .await?
            .query(&[("ref", git_ref)])
            .send()
            .await?;
        let response = check(response).await?;
        let value: serde_json::Value = response.json().await?;

        if value.is_array() {
            let entries: Vec<WireDirEntry> =
                serde_json::from_value(value).map_err(|e| GithubError::Decode(e.to_string()))?;
            return Ok(Contents::Dir(
                entries
                    .into_iter()
                    .map(|e| DirEntry {
                        name: e.name,
                        path: e.path,
                        kind: e.kind,
                    })
                    .collect(),
            ));
        }

        let file: WireFile =
            serde_json::from_value(value).map_err(|e| GithubError::Decode(e.to_string()))?;
        let encoded: String = file
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| GithubError::Decode(format!("bad base64 content: {e}")))?;
        let text =
            String::from_utf8(bytes).map_err(|e| GithubError::Decode(format!("not utf-8: {e}")))?;
        Ok(Contents::File(text))
    }

    async fn create_status(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), GithubError> {
        let response = self
            .request(
                installation_id,
                Method::POST,
                &format!("/repos/{owner}/{repo}/statuses/{sha}"),
            )
            .await?
            .json(&serde_json::json!({
                "state": status.state.as_str(),
                "context": status.context,
                "target_url": status.target_url,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GithubError> {
        let response = self
            .request(
                installation_id,
                Method::POST,
                &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            )
            .await?
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn permission_level(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        user: &str,
    ) -> Result<String, GithubError> {
        #[derive(Deserialize)]
        struct WirePermission {
            permission: String,
        }

        let response = self
            .request(
                installation_id,
                Method::GET,
                &format!("/repos/{owner}/{repo}/collaborators/{user}/permission"),
            )
            .await?
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: WirePermission = response.json().await?;
        Ok(parsed.permission)
    }

    async fn get_pull(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullInfo, GithubError> {
        let response = self
            .request(
                installation_id,
                Method::GET,
                &format!("/repos/{owner}/{repo}/pulls/{number}"),
            )
            .await?
            .send()
            .await?;
        let response = check(response).await?;
        let pull: WirePull = response.json().await?;
        Ok(PullInfo {
            number: pull.number,
            base_ref: pull.base.git_ref,
            head_sha: pull.head.sha,
            head_clone_url: pull.head.repo.clone_url,
            head_owner: pull.head.repo.owner.login,
        })
    }

    async fn create_token(
        &self,
        installation_id: u64,
        request: &TokenRequest,
    ) -> Result<String, GithubError> {
        self.mint_token(installation_id, request).await
    }
}
