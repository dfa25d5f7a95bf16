/// Mattermost REST v4 wire types
use serde::{Deserialize, Serialize};

/// Authenticated-user response (`GET /api/v4/users/me`), reduced to the
/// fields the bot needs
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserResponse {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// Direct-channel creation response (`POST /api/v4/channels/direct`)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChannelResponse {
    pub id: String,
}

/// Post creation request (`POST /api/v4/posts`)
#[derive(Debug, Serialize)]
pub(crate) struct PostRequest {
    pub channel_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<PostProps>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostProps {
    pub attachments: Vec<Attachment>,
}

/// Message attachment carrying the interactive buttons
#[derive(Debug, Serialize)]
pub(crate) struct Attachment {
    pub fallback: String,
    pub color: String,
    pub actions: Vec<PostAction>,
}

/// One interactive button
#[derive(Debug, Serialize)]
pub(crate) struct PostAction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub integration: ActionIntegration,
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionIntegration {
    pub url: String,
    pub context: ActionContext,
}

/// Context the platform round-trips back to the action webhook when a
/// button is pressed
///
/// `token` is the shared webhook secret; the platform stores the context
/// server-side, so the secret never reaches the client rendering the post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    pub action: String,
    pub user_id: String,
    pub event_uid: String,
    pub callback_id: String,
    pub token: String,
}

/// Post creation response, reduced to the post id
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PostResponse {
    pub id: String,
}
