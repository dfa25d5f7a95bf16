//! Action webhook HTTP server
//!
//! Receives the button callbacks Mattermost posts when a user presses
//! Snooze or Dismiss on a reminder card. The handler hands the callback
//! context to the `ActionService` and translates its reply into the
//! platform's response format: `update` rewrites the reminder post and
//! clears the buttons, `ephemeral_text` acknowledges without changing
//! anything. Every reachable outcome answers 200 with one of two bodies,
//! so a caller probing the endpoint cannot tell a stale callback from a
//! forged one, nor either from a record that never existed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chime_core::{ActionReply, ActionRequest, ActionService};
use chime_domain::constants::ACTION_ROUTE;
use chime_domain::{ChimeError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::integrations::mattermost::ActionContext;

const NOOP_TEXT: &str = "This reminder is no longer active.";
const FAILURE_TEXT: &str = "Something went wrong. Please try again.";

/// Button callback payload as Mattermost posts it
#[derive(Debug, Deserialize)]
struct CallbackPayload {
    /// Id of the user who pressed the button
    #[serde(default)]
    user_id: String,
    context: ActionContext,
}

/// HTTP server for reminder button callbacks
pub struct WebhookServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WebhookServer {
    /// Bind `bind_addr` and start serving the action route.
    pub async fn start(bind_addr: &str, actions: Arc<ActionService>) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await.map_err(|err| {
            ChimeError::Network(format!("failed to bind webhook server on {bind_addr}: {err}"))
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            ChimeError::Network(format!("failed to determine webhook address: {err}"))
        })?;

        let app = router(actions);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("webhook server error: {err}");
            }
        });

        info!(addr = %local_addr, route = ACTION_ROUTE, "action webhook listening");
        Ok(Self { local_addr, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// The address the server actually bound (port resolved for `:0`)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(ChimeError::Internal(format!("webhook server panicked: {err}")));
                }
            }
        }

        Ok(())
    }
}

impl Drop for WebhookServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

fn router(actions: Arc<ActionService>) -> Router {
    Router::new().route(ACTION_ROUTE, post(handle_action)).with_state(actions)
}

async fn handle_action(
    State(actions): State<Arc<ActionService>>,
    Json(payload): Json<CallbackPayload>,
) -> Json<Value> {
    debug!(
        pressed_by = %payload.user_id,
        action = %payload.context.action,
        "button callback received"
    );

    let request = ActionRequest {
        user_id: payload.context.user_id,
        event_uid: payload.context.event_uid,
        callback_id: payload.context.callback_id,
        action: payload.context.action,
        token: payload.context.token,
    };

    match actions.handle_action(request).await {
        Ok(ActionReply::Applied { text }) => {
            Json(json!({ "update": { "message": text, "props": {} } }))
        }
        Ok(ActionReply::Noop) => Json(json!({ "ephemeral_text": NOOP_TEXT })),
        Err(err) => {
            error!(error = %err, "action handling failed");
            Json(json!({ "ephemeral_text": FAILURE_TEXT }))
        }
    }
}
