//! HttpQuoteStore - quote API への REST クライアント
//!
//! # エンドポイント
//! - `GET   {base}/quote`              → `Vec<Quote>`
//! - `PATCH {base}/quote/{id}`         ← `{"state": "cancelled"}`
//! - `POST  {base}/quote/{id}/note`    ← `{"author", "date", "text"}`
//!
//! 2xx 以外はすべて `StoreError::Status` に、reqwest のエラーは timeout / decode /
//! transport に分類します。リトライはしません（sweep は翌日また走るため）。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{Quote, QuoteId, QuoteState, StoreError};
use crate::ports::{Clock, QuoteStore};

/// Header carrying the identity a mutation is attributed to.
pub const ACTOR_HEADER: &str = "x-actor-id";

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpStoreOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
}

impl Default for HttpStoreOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            auth_token: None,
        }
    }
}

#[derive(Serialize)]
struct StatusPatch<'a> {
    state: &'a QuoteState,
}

#[derive(Serialize)]
struct NoteBody<'a> {
    author: &'a str,
    date: DateTime<Utc>,
    text: &'a str,
}

pub struct HttpQuoteStore {
    client: Client,
    base_url: Url,
    clock: Arc<dyn Clock>,
}

impl HttpQuoteStore {
    pub fn new(
        base_url: Url,
        options: HttpStoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "{base_url} cannot be a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("lapse/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = &options.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| StoreError::Unavailable(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("cannot build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            clock,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        quote_id: Option<&QuoteId>,
    ) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(map_reqwest)?;
        if response.status() == StatusCode::NOT_FOUND
            && let Some(id) = quote_id
        {
            return Err(StoreError::NotFound(id.clone()));
        }
        Self::check(response).await
    }
}

/// Decode quotes one by one; a malformed entry is logged and left out
/// instead of failing the whole snapshot.
fn decode_snapshot(items: Vec<serde_json::Value>) -> Vec<Quote> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let id = item
                .get("id")
                .map(ToString::to_string)
                .unwrap_or_default();
            match serde_json::from_value::<Quote>(item) {
                Ok(quote) => Some(quote),
                Err(e) => {
                    warn!(index, quote_id = %id, error = %e, "skipping undecodable quote");
                    None
                }
            }
        })
        .collect()
}

fn map_reqwest(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else if err.is_decode() {
        StoreError::Decode(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

#[async_trait]
impl QuoteStore for HttpQuoteStore {
    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        let url = self.endpoint(&["quote"])?;
        debug!(%url, "listing quotes");
        let response = self.send(self.client.get(url), None).await?;
        let items = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout
                } else {
                    StoreError::Decode(e.to_string())
                }
            })?;
        Ok(decode_snapshot(items))
    }

    async fn update_status(
        &self,
        quote_id: &QuoteId,
        state: QuoteState,
        actor: &str,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&["quote", quote_id.as_str()])?;
        debug!(%url, state = %state, "updating quote status");
        let request = self
            .client
            .patch(url)
            .header(ACTOR_HEADER, actor)
            .json(&StatusPatch { state: &state });
        self.send(request, Some(quote_id)).await?;
        Ok(())
    }

    async fn append_note(
        &self,
        quote_id: &QuoteId,
        author: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&["quote", quote_id.as_str(), "note"])?;
        debug!(%url, "appending note");
        let request = self
            .client
            .post(url)
            .header(ACTOR_HEADER, author)
            .json(&NoteBody {
                author,
                date: self.clock.now(),
                text,
            });
        self.send(request, Some(quote_id)).await?;
        Ok(())
    }
}
