use log::{debug, info};
use reqwest::StatusCode;
use serde_json::json;
use shared::{CreateGameResponse, JoinGameResponse};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn games_url(&self) -> String {
        format!("{}/api/games", self.base_url)
    }

    pub fn join_url(&self, game_id: &str) -> String {
        format!("{}/api/games/{}/join", self.base_url, game_id)
    }

    /// Allocates a new game hosted by `name`.
    pub async fn create_game(&self, name: &str) -> Result<CreateGameResponse, ApiError> {
        let url = self.games_url();
        info!("Creating game for {}", name);
        let response = self.post(&url, json!({ "name": name })).await?;
        Ok(response.json::<CreateGameResponse>().await?)
    }

    /// Asks for an endpoint into an existing game. The response carries no
    /// game id; the caller already has it.
    pub async fn join_game(&self, game_id: &str) -> Result<JoinGameResponse, ApiError> {
        let url = self.join_url(game_id);
        info!("Joining game {}", game_id);
        let response = self.post(&url, json!({})).await?;
        Ok(response.json::<JoinGameResponse>().await?)
    }

    async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        debug!("POST {}", url);
        let response = self.http.post(url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(response)
    }
}
