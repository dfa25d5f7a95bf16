//! Mattermost REST v4 client
//!
//! Delivers reminder cards and plain notices over direct channels. Every
//! reminder card carries a pair of interactive buttons whose context is
//! round-tripped back to the action webhook; the callback id minted here
//! is what the reminder record stores to recognise the live delivery.

use async_trait::async_trait;
use chime_core::messaging_ports::MessagingGateway;
use chime_domain::config::{MattermostConfig, WebhookConfig};
use chime_domain::constants::ACTION_ROUTE;
use chime_domain::{ChimeError, ObservedEvent, ReminderAction, Result};
use chrono_tz::Tz;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::InfraError;
use crate::http::HttpClient;

use super::types::{
    ActionContext, ActionIntegration, Attachment, ChannelResponse, PostAction, PostProps,
    PostRequest, PostResponse, UserResponse,
};

const ATTACHMENT_COLOR: &str = "#3AA3E3";
const ATTACHMENT_FALLBACK: &str = "Meeting reminder";

/// Mattermost client bound to one server and one bot account
pub struct MattermostClient {
    http: HttpClient,
    base_url: String,
    bot_token: String,
    /// Public URL button callbacks are posted to
    actions_url: String,
    webhook_secret: String,
    snooze: chrono::Duration,
    tz: Tz,
    bot_user_id: OnceCell<String>,
}

impl MattermostClient {
    pub fn new(
        http: HttpClient,
        mattermost: &MattermostConfig,
        webhook: &WebhookConfig,
        snooze: chrono::Duration,
        tz: Tz,
    ) -> Self {
        let actions_url =
            format!("{}{}", webhook.public_base_url.trim_end_matches('/'), ACTION_ROUTE);
        Self {
            http,
            base_url: mattermost.base_url.trim_end_matches('/').to_string(),
            bot_token: mattermost.bot_token.clone(),
            actions_url,
            webhook_secret: webhook.shared_secret.clone(),
            snooze,
            tz,
            bot_user_id: OnceCell::new(),
        }
    }

    /// Check the bot token against the server and cache the bot user id
    ///
    /// # Errors
    /// Returns `ChimeError::Auth` when the server rejects the token.
    pub async fn verify_identity(&self) -> Result<String> {
        let me = self.fetch_me().await?;
        info!(bot_user_id = %me.id, username = %me.username, "connected to Mattermost");
        let username = me.username;
        let _ = self.bot_user_id.set(me.id);
        Ok(username)
    }

    async fn fetch_me(&self) -> Result<UserResponse> {
        let builder = self
            .http
            .request(Method::GET, format!("{}/api/v4/users/me", self.base_url))
            .header("Authorization", format!("Bearer {}", self.bot_token));
        let response = self.http.send(builder).await?;
        if let Err(err) = response.error_for_status_ref() {
            let infra: InfraError = err.into();
            return Err(ChimeError::from(infra));
        }
        response
            .json()
            .await
            .map_err(|err| ChimeError::Protocol(format!("malformed users/me response: {err}")))
    }

    async fn bot_user_id(&self) -> Result<&str> {
        self.bot_user_id
            .get_or_try_init(|| async { self.fetch_me().await.map(|me| me.id) })
            .await
            .map(String::as_str)
    }

    /// POST a JSON payload and decode a JSON response
    ///
    /// Non-success statuses become `ChimeError::Delivery` rather than the
    /// generic status mapping: a rejected post must not read as a user
    /// authentication failure to the sync loop.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let builder = self
            .http
            .request(Method::POST, format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .json(body);
        let response = self.http.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChimeError::Delivery(format!("{path} rejected with status {status}")));
        }
        response
            .json()
            .await
            .map_err(|err| ChimeError::Protocol(format!("malformed {path} response: {err}")))
    }

    /// Create or look up the direct channel between the bot and a user
    async fn direct_channel_id(&self, user_id: &str) -> Result<String> {
        let bot_id = self.bot_user_id().await?;
        let channel: ChannelResponse =
            self.post_json("/api/v4/channels/direct", &[bot_id, user_id]).await?;
        Ok(channel.id)
    }

    fn reminder_message(&self, event: &ObservedEvent) -> String {
        let mut message = format!("⏰ **Meeting reminder**\n\n**{}**", event.title);
        if let Some(starts_at) = event.starts_at_utc() {
            let local = starts_at.with_timezone(&self.tz);
            message.push_str(&format!("\nStarts: {}", local.format("%d.%m.%Y %H:%M")));
        }
        if let Some(location) = &event.location {
            message.push_str(&format!("\nWhere: {location}"));
        }
        message
    }

    fn reminder_attachment(&self, user_id: &str, event_uid: &str, callback_id: &str) -> Attachment {
        let snooze_minutes = self.snooze.num_minutes().max(1);
        Attachment {
            fallback: ATTACHMENT_FALLBACK.to_string(),
            color: ATTACHMENT_COLOR.to_string(),
            actions: vec![
                self.button(
                    format!("Snooze {snooze_minutes} min"),
                    ReminderAction::Snooze,
                    user_id,
                    event_uid,
                    callback_id,
                    None,
                ),
                self.button(
                    "Dismiss".to_string(),
                    ReminderAction::Dismiss,
                    user_id,
                    event_uid,
                    callback_id,
                    Some("danger"),
                ),
            ],
        }
    }

    fn button(
        &self,
        name: String,
        action: ReminderAction,
        user_id: &str,
        event_uid: &str,
        callback_id: &str,
        style: Option<&str>,
    ) -> PostAction {
        PostAction {
            name,
            style: style.map(str::to_string),
            integration: ActionIntegration {
                url: self.actions_url.clone(),
                context: ActionContext {
                    action: action.as_str().to_string(),
                    user_id: user_id.to_string(),
                    event_uid: event_uid.to_string(),
                    callback_id: callback_id.to_string(),
                    token: self.webhook_secret.clone(),
                },
            },
        }
    }
}

#[async_trait]
impl MessagingGateway for MattermostClient {
    async fn send_reminder(&self, user_id: &str, event: &ObservedEvent) -> Result<String> {
        let channel_id = self.direct_channel_id(user_id).await?;
        let callback_id = Uuid::new_v4().to_string();

        let request = PostRequest {
            channel_id,
            message: self.reminder_message(event),
            props: Some(PostProps {
                attachments: vec![self.reminder_attachment(user_id, &event.uid, &callback_id)],
            }),
        };
        let post: PostResponse = self.post_json("/api/v4/posts", &request).await?;

        debug!(
            user_id = %user_id,
            event_uid = %event.uid,
            post_id = %post.id,
            "reminder card posted"
        );
        Ok(callback_id)
    }

    async fn send_notice(&self, user_id: &str, text: &str) -> Result<()> {
        let channel_id = self.direct_channel_id(user_id).await?;
        let request =
            PostRequest { channel_id, message: text.to_string(), props: None };
        let _: PostResponse = self.post_json("/api/v4/posts", &request).await?;
        Ok(())
    }
}
