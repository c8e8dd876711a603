//! HTTP client for the room API
//!
//! Speaks the same wire surface the server exposes and implements
//! [`FeedSource`], so a [`FeedSubscriber`](crate::feed::FeedSubscriber) can
//! follow a remote room exactly like an in-process one.
//!
//! ```rust,no_run
//! use scib_room::client::RoomClient;
//! use scib_room::feed::FeedSubscriber;
//!
//! # async fn example() -> scib_room::Result<()> {
//! let client = RoomClient::new("http://localhost:8080", "case01")?.with_user("Kelly");
//! client.publish("check E-06").await?;
//!
//! let subscriber = FeedSubscriber::new(client);
//! subscriber.run(|entry| println!("{}: {}", entry.author, entry.body)).await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::feed::{validate_room_id, Entry, FeedEventStream, FeedSource};
use crate::sse::{self, SseDecoder, SseMessage};
use crate::types::api::{
    Ack, JoinRequest, JoinResponse, PostsResponse, PublishRequest, UnlockRequest, UnlockResponse,
    UnlocksResponse,
};
use crate::types::{Result, RoomError};

/// Header carrying the caller's display identity
pub const USER_HEADER: &str = "x-scib-user";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client bound to one room on one server
#[derive(Clone)]
pub struct RoomClient {
    client: Client,
    base_url: String,
    room: String,
    user: Option<String>,
}

impl RoomClient {
    pub fn new(base_url: &str, room: &str) -> Result<Self> {
        validate_room_id(room)?;

        // No overall timeout: it would cut the event stream. Plain requests
        // get REQUEST_TIMEOUT individually.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RoomError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            room: room.to_string(),
            user: None,
        })
    }

    /// Send `name` as the display identity on every request
    pub fn with_user(mut self, name: impl Into<String>) -> Self {
        self.user = Some(name.into());
        self
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ==================== Feed ====================

    /// Current posts, newest first
    pub async fn snapshot(&self) -> Result<Vec<Entry>> {
        let response = self.request(self.client.get(self.room_url(""))).send().await?;
        let body: PostsResponse = self.handle_response(response).await?;
        Ok(body.posts)
    }

    /// Submit a post. A rejected body comes back as [`RoomError::Validation`].
    pub async fn publish(&self, text: &str) -> Result<()> {
        let response = self
            .request(self.client.post(self.room_url("")))
            .json(&PublishRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let ack: Ack = self.handle_response(response).await?;
        if ack.ok {
            Ok(())
        } else {
            Err(RoomError::Validation(ack.error.unwrap_or_default()))
        }
    }

    /// Open the event stream. Frames are decoded as they arrive; a broken
    /// connection surfaces as one [`RoomError::Transport`] item.
    pub async fn stream(&self) -> Result<FeedEventStream> {
        let response = self
            .client
            .get(self.room_url("/stream"))
            .header(header::ACCEPT, sse::CONTENT_TYPE);
        let response = self.with_identity(response).send().await?;

        if !response.status().is_success() {
            return Err(RoomError::Transport(format!(
                "Stream refused with HTTP {}",
                response.status()
            )));
        }
        debug!(room = %self.room, "Event stream opened");

        let mut decoder = SseDecoder::new();
        let events = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<_>> = match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .filter_map(SseMessage::into_feed_event)
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(RoomError::Transport(e.to_string()))],
            };
            stream::iter(items)
        });
        Ok(events.boxed())
    }

    // ==================== Unlocks ====================

    pub async fn unlocks(&self) -> Result<UnlocksResponse> {
        let response = self
            .request(self.client.get(self.room_url("/unlocks")))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Unlock `key` for this client's identity. A rejected key comes back as
    /// [`RoomError::Validation`] carrying the server's message.
    pub async fn unlock(&self, key: &str) -> Result<UnlockResponse> {
        let response = self
            .request(self.client.post(self.room_url("/unlocks")))
            .json(&UnlockRequest {
                key: key.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    // ==================== Identity ====================

    /// Register a display name. The server answers with a cookie that this
    /// client ignores; it keeps using the header instead.
    pub async fn join(&self, username: &str) -> Result<JoinResponse> {
        let response = self
            .client
            .post(format!("{}/api/join", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(&JoinRequest {
                username: username.to_string(),
            })
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ==================== Helper Methods ====================

    fn room_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/room/{}{}",
            self.base_url,
            urlencoding::encode(&self.room),
            suffix
        )
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        self.with_identity(builder.timeout(REQUEST_TIMEOUT))
    }

    fn with_identity(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.user {
            Some(ref user) => builder.header(USER_HEADER, user.as_str()),
            None => builder,
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RoomError::NotFound(format!("room {}", self.room)));
        }

        // Rejections carry `{ ok: false, error }` with a message meant for display
        if status == StatusCode::BAD_REQUEST {
            let message = match response.json::<Ack>().await {
                Ok(ack) => ack.error.unwrap_or_default(),
                Err(_) => "Bad request".to_string(),
            };
            return Err(RoomError::Validation(message));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoomError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let raw = response.bytes().await?;
        serde_json::from_slice(&raw)
            .map_err(|e| RoomError::Transport(format!("Invalid response body: {}", e)))
    }
}

#[async_trait]
impl FeedSource for RoomClient {
    async fn snapshot(&self) -> Result<Vec<Entry>> {
        RoomClient::snapshot(self).await
    }

    async fn subscribe(&self) -> Result<FeedEventStream> {
        self.stream().await
    }
}
