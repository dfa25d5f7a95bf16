//! Application context - dependency injection container

use std::sync::Arc;

use chime_core::{
    ActionService, CalendarSource, CredentialCipher, EventRepository, MessagingGateway,
    ReminderRepository, SyncService, UserRepository,
};
use chime_domain::{ChimeError, Config, Result};
use chime_infra::{
    CaldavClient, DbManager, HttpClient, MattermostClient, ReminderScheduler,
    ReminderSchedulerConfig, SqliteEventRepository, SqliteReminderRepository,
    SqliteUserRepository, VaultCipher, WebhookServer,
};
use tracing::info;

const USER_AGENT: &str = concat!("chime/", env!("CARGO_PKG_VERSION"));

/// Application context - owns the two long-running pieces of the daemon
///
/// Building a context brings the whole system up: storage migrated, the
/// credential vault unlocked, the bot token verified against Mattermost,
/// the action webhook listening and the poll scheduler ticking.
/// [`AppContext::shutdown`] tears it down again.
pub struct AppContext {
    scheduler: ReminderScheduler,
    webhook: WebhookServer,
}

impl AppContext {
    /// Create and start the application context
    ///
    /// Fail-fast: broken configuration, storage or a rejected Mattermost
    /// token surfaces here instead of on the first tick.
    pub async fn start(config: Config) -> Result<Self> {
        let tz = config.calendar.tz()?;

        // Initialize database and apply schema
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        // Unlock the credential vault
        let cipher: Arc<dyn CredentialCipher> =
            Arc::new(VaultCipher::from_base64_key(&config.security.credential_key)?);

        // Repositories over the shared pool
        let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db.clone()));
        let events: Arc<dyn EventRepository> = Arc::new(SqliteEventRepository::new(db.clone()));
        let reminders: Arc<dyn ReminderRepository> =
            Arc::new(SqliteReminderRepository::new(db.clone()));

        // CalDAV client: one attempt per request, the poll cadence is the retry
        let caldav_http = HttpClient::builder().max_attempts(1).user_agent(USER_AGENT).build()?;
        let caldav = Arc::new(CaldavClient::new(caldav_http, &config.calendar.base_url, tz));
        let calendar: Arc<dyn CalendarSource> = caldav;

        // Mattermost client, token checked before anything else runs
        let mattermost_http = HttpClient::builder().user_agent(USER_AGENT).build()?;
        let mattermost = Arc::new(MattermostClient::new(
            mattermost_http,
            &config.mattermost,
            &config.webhook,
            config.calendar.snooze(),
            tz,
        ));
        let bot_username = mattermost.verify_identity().await?;
        info!(bot_username = %bot_username, "Mattermost identity verified");
        let gateway: Arc<dyn MessagingGateway> = mattermost;

        // Services
        let sync_service = Arc::new(SyncService::new(
            users,
            events,
            reminders.clone(),
            calendar,
            gateway,
            cipher,
            config.calendar.clone(),
        ));
        let action_service = Arc::new(ActionService::new(
            reminders,
            config.webhook.shared_secret.clone(),
            config.calendar.snooze(),
            tz,
        ));

        // Webhook first so button callbacks are never sent into the void
        let webhook = WebhookServer::start(&config.webhook.bind_addr, action_service).await?;

        let mut scheduler = ReminderScheduler::new(
            sync_service,
            ReminderSchedulerConfig {
                interval: config.calendar.poll_interval(),
                ..ReminderSchedulerConfig::default()
            },
        );
        scheduler.start().await.map_err(ChimeError::from)?;

        Ok(Self { scheduler, webhook })
    }

    /// Stop the scheduler and the webhook server
    ///
    /// The scheduler goes first so no tick can send a reminder whose
    /// buttons would have nowhere to call back to.
    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.stop().await.map_err(ChimeError::from)?;
        self.webhook.shutdown().await?;
        info!("Application context stopped");
        Ok(())
    }
}
