//! Discord Bot channel — REST API + Gateway WebSocket.
//!
//! REST is used to resolve the destination channel and post notification
//! embeds. The Gateway connection only feeds the bot's readiness and the
//! text commands typed by users.

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use storewatch_core::config::DiscordConfig;
use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::Channel;
use storewatch_core::types::{IncomingMessage, Notification, OutgoingMessage};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Channel types that accept messages: guild text, DM, group DM,
/// announcement and the three thread kinds.
const SENDABLE_CHANNEL_TYPES: &[u8] = &[0, 1, 3, 5, 10, 11, 12];

/// Only 403 and 404 mean the channel itself is gone or hidden from the bot.
fn status_error(channel_id: &str, status: reqwest::StatusCode, text: &str) -> WatchError {
    match status.as_u16() {
        403 | 404 => WatchError::unavailable(format!("channel {channel_id}: Discord {status}: {text}")),
        429 => WatchError::RateLimited(format!("Discord {status}: {text}")),
        _ => WatchError::dispatch(format!("Discord {status}: {text}")),
    }
}

/// Discord Bot channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: reqwest::Client,
    api_base: String,
    connected: bool,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", config.bot_token)
                .parse::<reqwest::header::HeaderValue>()
                .map_err(|_| WatchError::config("discord.bot_token contains invalid characters"))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("StoreWatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WatchError::config(format!("HTTP client: {e}")))?;

        Ok(Self { config, client, api_base: DEFAULT_API_BASE.into(), connected: false })
    }

    /// Point REST calls at another base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a plain text message to a channel.
    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
        let body = serde_json::json!({ "content": content });
        self.post_message(channel_id, &body).await
    }

    /// Send a notification as an embed.
    pub async fn send_embed(&self, channel_id: &str, notification: &Notification) -> Result<()> {
        let body = serde_json::json!({ "embeds": [embed_json(notification)] });
        self.post_message(channel_id, &body).await
    }

    async fn post_message(&self, channel_id: &str, body: &serde_json::Value) -> Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                WatchError::Timeout(format!("Discord send: {e}"))
            } else {
                WatchError::dispatch(format!("Discord send failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(status_error(channel_id, status, &text))
    }

    /// Fetch channel metadata.
    pub async fn get_channel(&self, channel_id: &str) -> Result<DiscordChannelInfo> {
        let url = format!("{}/channels/{channel_id}", self.api_base);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                WatchError::Timeout(format!("channel {channel_id} lookup: {e}"))
            } else {
                WatchError::Http(format!("channel {channel_id} lookup failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(channel_id, status, &text));
        }
        response.json().await
            .map_err(|e| WatchError::Http(format!("channel {channel_id}: invalid response: {e}")))
    }

    /// Get current bot info.
    pub async fn get_me(&self) -> Result<DiscordUser> {
        let response = self.client
            .get(format!("{}/users/@me", self.api_base))
            .send().await
            .map_err(|e| WatchError::Http(format!("getMe failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WatchError::AuthFailed(format!("Discord rejected the bot token ({})", response.status())));
        }
        response.json().await
            .map_err(|e| WatchError::Http(format!("Invalid response: {e}")))
    }

    /// Get Gateway WebSocket URL.
    pub async fn get_gateway_url(&self) -> Result<String> {
        let response = self.client
            .get(format!("{}/gateway/bot", self.api_base))
            .send().await
            .map_err(|e| WatchError::Http(format!("Gateway request failed: {e}")))?;

        let body: serde_json::Value = response.json().await
            .map_err(|e| WatchError::Http(format!("Invalid gateway response: {e}")))?;

        body["url"].as_str()
            .map(|s| format!("{s}/?v=10&encoding=json"))
            .ok_or_else(|| WatchError::Http("No gateway URL".into()))
    }

    /// Start the Gateway WebSocket connection on a background task.
    /// Auto-reconnects on disconnect with exponential backoff.
    pub fn start_gateway(&self) -> DiscordGatewayStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = Self {
            config: self.config.clone(),
            client: self.client.clone(),
            api_base: self.api_base.clone(),
            connected: self.connected,
        };

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 5;

            loop {
                tracing::info!("Discord Gateway connecting...");

                match channel.run_gateway_session(&tx).await {
                    Ok(SessionEnd::ReceiverDropped) => {
                        tracing::info!("Discord stream closed (receiver dropped)");
                        return;
                    }
                    Ok(SessionEnd::Reconnect) => backoff_secs = 5,
                    Err(e) => tracing::error!("Discord Gateway error: {e}"),
                }

                tracing::info!("Discord Gateway disconnected, reconnecting in {backoff_secs}s...");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
            }
        });

        DiscordGatewayStream { rx }
    }

    async fn run_gateway_session(
        &self,
        tx: &tokio::sync::mpsc::UnboundedSender<GatewayEvent>,
    ) -> Result<SessionEnd> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message as WsMsg;

        let gateway_url = self.get_gateway_url().await?;
        let (mut ws, _) = tokio_tungstenite::connect_async(&gateway_url)
            .await
            .map_err(|e| WatchError::Http(format!("Gateway WebSocket failed: {e}")))?;
        tracing::info!("Discord Gateway connected");

        let mut heartbeat = heartbeat_interval(41250);
        let mut seq: Option<u64> = None;
        let mut identified = false;

        loop {
            tokio::select! {
                msg = ws.next() => {
                    let text = match msg {
                        Some(Ok(WsMsg::Text(text))) => text,
                        Some(Ok(WsMsg::Close(_))) => {
                            tracing::warn!("Discord Gateway closed by server");
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Err(e)) => return Err(WatchError::Http(format!("Gateway error: {e}"))),
                        None => return Ok(SessionEnd::Reconnect),
                        _ => continue,
                    };

                    let Ok(payload) = serde_json::from_str::<serde_json::Value>(&text) else {
                        continue;
                    };
                    if let Some(s) = payload["s"].as_u64() {
                        seq = Some(s);
                    }

                    match payload["op"].as_u64().unwrap_or(0) {
                        10 => {
                            let interval_ms = payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41250);
                            tracing::debug!("Gateway Hello: heartbeat={interval_ms}ms");
                            heartbeat = heartbeat_interval(interval_ms);

                            if !identified {
                                let identify = serde_json::json!({
                                    "op": 2,
                                    "d": {
                                        "token": self.config.bot_token,
                                        "intents": self.config.intents,
                                        "properties": {
                                            "os": std::env::consts::OS,
                                            "browser": "storewatch",
                                            "device": "storewatch"
                                        }
                                    }
                                });
                                ws.send(WsMsg::Text(identify.to_string())).await
                                    .map_err(|e| WatchError::Http(format!("Identify failed: {e}")))?;
                                identified = true;
                            }
                        }
                        11 => tracing::trace!("Heartbeat ACK"),
                        0 => {
                            if let Some(event) = parse_dispatch(&payload) {
                                if tx.send(event).is_err() {
                                    return Ok(SessionEnd::ReceiverDropped);
                                }
                            }
                        }
                        7 => {
                            tracing::warn!("Gateway requesting reconnect");
                            return Ok(SessionEnd::Reconnect);
                        }
                        9 => {
                            tracing::warn!("Invalid session, reconnecting");
                            return Ok(SessionEnd::Reconnect);
                        }
                        _ => {}
                    }
                }
                _ = heartbeat.tick() => {
                    let beat = serde_json::json!({ "op": 1, "d": seq });
                    ws.send(WsMsg::Text(beat.to_string())).await
                        .map_err(|e| WatchError::Http(format!("Heartbeat send failed: {e}")))?;
                    tracing::trace!("Heartbeat sent (seq={seq:?})");
                }
            }
        }
    }
}

fn heartbeat_interval(ms: u64) -> tokio::time::Interval {
    let period = Duration::from_millis(ms);
    tokio::time::interval_at(tokio::time::Instant::now() + period, period)
}

enum SessionEnd {
    Reconnect,
    ReceiverDropped,
}

/// Events surfaced from the Gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready { user_id: String, username: String },
    Message(IncomingMessage),
}

/// Turn a Gateway dispatch (op 0) into an event. Bot-authored messages
/// and unrelated events are dropped.
pub fn parse_dispatch(payload: &serde_json::Value) -> Option<GatewayEvent> {
    let d = &payload["d"];
    match payload["t"].as_str()? {
        "READY" => {
            let username = d["user"]["username"].as_str().unwrap_or("unknown").to_string();
            tracing::info!("Discord Gateway READY as {username}");
            Some(GatewayEvent::Ready {
                user_id: d["user"]["id"].as_str().unwrap_or("").into(),
                username,
            })
        }
        "MESSAGE_CREATE" => {
            if d["author"]["bot"].as_bool().unwrap_or(false) {
                return None;
            }
            Some(GatewayEvent::Message(IncomingMessage {
                channel_id: d["channel_id"].as_str()?.into(),
                author_id: d["author"]["id"].as_str().unwrap_or("").into(),
                author_name: d["author"]["username"].as_str().map(String::from),
                author_is_bot: false,
                content: d["content"].as_str().unwrap_or("").into(),
                guild_id: d["guild_id"].as_str().map(String::from),
                timestamp: chrono::Utc::now(),
            }))
        }
        other => {
            tracing::trace!("Ignoring event: {other}");
            None
        }
    }
}

fn embed_json(notification: &Notification) -> serde_json::Value {
    let mut embed = serde_json::json!({
        "title": notification.title,
        "description": notification.body,
        "color": notification.color,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "footer": { "text": notification.footer },
    });
    if let Some(image) = &notification.image {
        embed["image"] = serde_json::json!({ "url": image });
    }
    embed
}

/// Stream of Gateway events.
pub struct DiscordGatewayStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<GatewayEvent>,
}

impl Stream for DiscordGatewayStream {
    type Item = GatewayEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str { "discord" }

    async fn connect(&mut self) -> Result<()> {
        let me = self.get_me().await?;
        tracing::info!("Discord bot: {} ({})", me.username, me.id);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool { self.connected }

    async fn resolve_destination(&self, destination: &str) -> Result<()> {
        let info = self.get_channel(destination).await?;
        if SENDABLE_CHANNEL_TYPES.contains(&info.kind) {
            Ok(())
        } else {
            Err(WatchError::unavailable(format!(
                "channel {destination} (type {}) does not accept messages",
                info.kind
            )))
        }
    }

    async fn send_notification(&self, destination: &str, notification: &Notification) -> Result<()> {
        self.send_embed(destination, notification).await
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.send_message(&message.channel_id, &message.content).await
    }
}

// --- Discord API Types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub bot: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannelInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn channel(server: &MockServer) -> DiscordChannel {
        let config = DiscordConfig { bot_token: "tok".into(), ..Default::default() };
        DiscordChannel::new(config).unwrap().with_api_base(server.uri())
    }

    fn notification() -> Notification {
        Notification {
            title: "🎮 New game added!".into(),
            body: "**Celeste**\nClimb.".into(),
            image: Some("https://img/c.png".into()),
            footer: "id: celeste".into(),
            color: 0x00ff00,
        }
    }

    #[tokio::test]
    async fn test_send_embed_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .and(header("authorization", "Bot tok"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{
                    "title": "🎮 New game added!",
                    "description": "**Celeste**\nClimb.",
                    "color": 65280,
                    "footer": {"text": "id: celeste"},
                    "image": {"url": "https://img/c.png"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server).await.send_notification("42", &notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_error_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/channels/1/messages"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Channel"))
            .mount(&server).await;
        Mock::given(method("POST")).and(path("/channels/2/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server).await;
        Mock::given(method("POST")).and(path("/channels/3/messages"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server).await;

        let discord = channel(&server).await;
        let n = notification();
        assert!(matches!(
            discord.send_notification("1", &n).await.unwrap_err(),
            WatchError::DestinationUnavailable(_)
        ));
        assert!(matches!(discord.send_notification("2", &n).await.unwrap_err(), WatchError::RateLimited(_)));
        let err = discord.send_notification("3", &n).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_resolve_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/channels/10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "10", "type": 0, "name": "games"})))
            .mount(&server).await;
        Mock::given(method("GET")).and(path("/channels/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "11", "type": 2, "name": "voice"})))
            .mount(&server).await;
        Mock::given(method("GET")).and(path("/channels/12"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server).await;
        Mock::given(method("GET")).and(path("/channels/13"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream"))
            .mount(&server).await;
        Mock::given(method("GET")).and(path("/channels/14"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server).await;

        let discord = channel(&server).await;
        assert!(discord.resolve_destination("10").await.is_ok());
        assert!(matches!(
            discord.resolve_destination("11").await.unwrap_err(),
            WatchError::DestinationUnavailable(_)
        ));
        assert!(matches!(
            discord.resolve_destination("12").await.unwrap_err(),
            WatchError::DestinationUnavailable(_)
        ));

        // An outage on Discord's side is not a missing channel.
        let outage = discord.resolve_destination("13").await.unwrap_err();
        assert!(matches!(outage, WatchError::Dispatch(ref m) if m.contains("503")));
        assert!(outage.is_transient());
        assert!(matches!(
            discord.resolve_destination("14").await.unwrap_err(),
            WatchError::RateLimited(_)
        ));
    }

    #[tokio::test]
    async fn test_resolve_destination_unreachable_api() {
        let config = DiscordConfig { bot_token: "tok".into(), ..Default::default() };
        let discord = DiscordChannel::new(config).unwrap().with_api_base("http://127.0.0.1:9");
        assert!(matches!(
            discord.resolve_destination("10").await.unwrap_err(),
            WatchError::Http(_)
        ));
    }

    #[tokio::test]
    async fn test_connect_with_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/users/@me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server).await;

        let mut discord = channel(&server).await;
        assert!(matches!(discord.connect().await.unwrap_err(), WatchError::AuthFailed(_)));
        assert!(!discord.is_connected());
    }

    #[test]
    fn test_parse_message_create() {
        let payload = serde_json::json!({
            "op": 0, "s": 3, "t": "MESSAGE_CREATE",
            "d": {
                "channel_id": "42",
                "guild_id": "9",
                "content": "!status",
                "author": {"id": "7", "username": "ana"}
            }
        });
        let Some(GatewayEvent::Message(msg)) = parse_dispatch(&payload) else {
            panic!("expected a message event");
        };
        assert_eq!(msg.channel_id, "42");
        assert_eq!(msg.author_id, "7");
        assert_eq!(msg.content, "!status");
        assert_eq!(msg.guild_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_parse_ignores_bots_and_other_events() {
        let bot = serde_json::json!({
            "op": 0, "t": "MESSAGE_CREATE",
            "d": {"channel_id": "1", "content": "hi", "author": {"id": "2", "bot": true}}
        });
        assert!(parse_dispatch(&bot).is_none());

        let typing = serde_json::json!({"op": 0, "t": "TYPING_START", "d": {}});
        assert!(parse_dispatch(&typing).is_none());
    }

    #[test]
    fn test_parse_ready() {
        let payload = serde_json::json!({
            "op": 0, "t": "READY",
            "d": {"user": {"id": "100", "username": "storewatch"}}
        });
        assert!(matches!(
            parse_dispatch(&payload),
            Some(GatewayEvent::Ready { ref username, .. }) if username == "storewatch"
        ));
    }

    #[test]
    fn test_embed_without_image() {
        let mut n = notification();
        n.image = None;
        let embed = embed_json(&n);
        assert!(embed.get("image").is_none());
        assert_eq!(embed["footer"]["text"], "id: celeste");
    }
}
