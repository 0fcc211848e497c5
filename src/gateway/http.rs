use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::Note;

use super::{GatewayError, LookupGateway};

#[derive(Serialize)]
struct CheckWordsRequest<'a> {
    words: &'a [String],
}

#[derive(Serialize)]
struct WordRequest<'a> {
    word: &'a str,
}

#[derive(Deserialize)]
struct InitializeResponse {
    message: String,
}

/// `/get_note` answers with a bare title and content.
#[derive(Deserialize)]
struct NoteResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// JSON-over-HTTP client for the lookup service.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| self.classify(err))
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Http(err)
        }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|err| self.classify(err))?;
        serde_json::from_slice(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl LookupGateway for HttpGateway {
    async fn initialize(&self) -> Result<String, GatewayError> {
        let response = self.post("/initialize", &serde_json::json!({})).await?;
        let body: InitializeResponse = self.decode(response).await?;
        Ok(body.message)
    }

    async fn check_words(
        &self,
        words: &[String],
    ) -> Result<HashMap<String, Vec<Note>>, GatewayError> {
        let response = self.post("/check_word", &CheckWordsRequest { words }).await?;
        self.decode(response).await
    }

    async fn get_note(&self, word: &str) -> Result<Option<Note>, GatewayError> {
        let response = self.post("/get_note", &WordRequest { word }).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|err| self.classify(err))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let note: NoteResponse =
            serde_json::from_slice(&body).map_err(|err| GatewayError::Decode(err.to_string()))?;
        if note.title.is_empty() && note.content.is_empty() {
            return Ok(None);
        }

        Ok(Some(Note::new(note.title, note.content)))
    }
}
