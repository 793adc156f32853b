//! Auth gateway client.
//!
//! Two calls before any socket is opened: `POST /token/test` exchanges a
//! username for a jwt, `POST /characters` lists the account's characters.
//! The dev gateway serves a self-signed cert, so certificate validation is
//! off, matching the upstream test tooling.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AuthFailed;

const PLATFORM: &str = "TEST";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwt: String,
}

#[derive(Debug, Serialize)]
struct CharactersRequest<'a> {
    platform: &'a str,
    username: &'a str,
    jwt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CharactersResponse {
    characters: Vec<Character>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Character {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, AuthFailed> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(AuthFailed::Http)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn request_auth_token(&self, username: &str) -> Result<String, AuthFailed> {
        let url = format!("{}/token/test", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(&TokenRequest { username })
            .send()
            .await
            .map_err(AuthFailed::Http)?
            .error_for_status()
            .map_err(AuthFailed::Http)?;
        let t: TokenResponse = resp
            .json()
            .await
            .map_err(|_| AuthFailed::MalformedResponse("missing or invalid jwt"))?;
        Ok(t.jwt)
    }

    /// Returns the account's characters; an empty list is an error, since a
    /// bot without a character cannot join.
    pub async fn request_characters(
        &self,
        username: &str,
        jwt: &str,
    ) -> Result<Vec<Character>, AuthFailed> {
        let url = format!("{}/characters", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(&CharactersRequest {
                platform: PLATFORM,
                username,
                jwt,
            })
            .send()
            .await
            .map_err(AuthFailed::Http)?
            .error_for_status()
            .map_err(AuthFailed::Http)?;
        let c: CharactersResponse = resp
            .json()
            .await
            .map_err(|_| AuthFailed::MalformedResponse("missing or invalid characters"))?;
        if c.characters.is_empty() {
            return Err(AuthFailed::NoCharacters);
        }
        Ok(c.characters)
    }
}
