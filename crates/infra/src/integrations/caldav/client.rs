//! CalDAV protocol client
//!
//! Speaks the WebDAV subset the reminder pipeline needs: a PROPFIND
//! discovery chain to find a user's calendar collection and a REPORT
//! calendar-query to pull the events inside the sync window. Authentication
//! is HTTP Basic with the account email and app password; the password is
//! only ever borrowed for the duration of one request.

use std::sync::OnceLock;

use async_trait::async_trait;
use chime_core::calendar_ports::{
    CalendarCredentials, CalendarLocator, CalendarSource, FetchedEvent,
};
use chime_domain::{ChimeError, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use reqwest::Method;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::InfraError;
use crate::http::HttpClient;

use super::ics;

const TIME_RANGE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const PREFERRED_CALENDAR_NAME: &str = "main";

const PRINCIPAL_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:current-user-principal/>
  </D:prop>
</D:propfind>"#;

const HOME_SET_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-home-set/>
  </D:prop>
</D:propfind>"#;

const LISTING_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:displayname/>
  </D:prop>
</D:propfind>"#;

/// CalDAV client bound to one server base URL
pub struct CaldavClient {
    http: HttpClient,
    base_url: String,
    tz: Tz,
}

impl CaldavClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, tz: Tz) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, tz }
    }

    /// Resolve an href from a multistatus document against the server base
    fn resolve_href(&self, href: &str) -> Result<String> {
        let base = Url::parse(&self.base_url).map_err(|err| {
            ChimeError::Config(format!("invalid CalDAV base URL {}: {err}", self.base_url))
        })?;
        let resolved = base
            .join(href)
            .map_err(|err| ChimeError::Protocol(format!("unresolvable href {href}: {err}")))?;
        Ok(resolved.to_string())
    }

    async fn dav_request(
        &self,
        method: &str,
        url: &str,
        depth: &str,
        body: String,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ChimeError::Internal(format!("invalid HTTP method {method}")))?;

        let builder = self
            .http
            .request(method, url)
            .basic_auth(username, Some(password))
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body);

        let response = self.http.send(builder).await?;
        if let Err(err) = response.error_for_status_ref() {
            return Err(map_transport_error(err));
        }
        response.text().await.map_err(map_transport_error)
    }

    /// Follow the standard discovery chain down to a calendar collection.
    ///
    /// Every miss along the way is a `Protocol` error; the caller decides
    /// whether that warrants the well-known fallback path.
    async fn walk_discovery_chain(&self, username: &str, password: &str) -> Result<String> {
        let principal_response = self
            .dav_request("PROPFIND", &self.base_url, "0", PRINCIPAL_QUERY.to_string(), username, password)
            .await?;
        let principal_href = element_href(&principal_response, principal_regex())
            .ok_or_else(|| ChimeError::Protocol("no current-user-principal in response".into()))?;
        let principal_url = self.resolve_href(&principal_href)?;
        debug!("resolved principal");

        let home_response = self
            .dav_request("PROPFIND", &principal_url, "0", HOME_SET_QUERY.to_string(), username, password)
            .await?;
        let home_href = element_href(&home_response, home_set_regex())
            .ok_or_else(|| ChimeError::Protocol("no calendar-home-set in response".into()))?;
        let home_url = self.resolve_href(&home_href)?;
        debug!("resolved calendar home");

        let listing_response = self
            .dav_request("PROPFIND", &home_url, "1", LISTING_QUERY.to_string(), username, password)
            .await?;
        let collections = calendar_collections(&listing_response);
        if collections.is_empty() {
            return Err(ChimeError::Protocol("calendar home lists no calendar collections".into()));
        }

        let chosen = collections
            .iter()
            .find(|c| c.display_name.eq_ignore_ascii_case(PREFERRED_CALENDAR_NAME))
            .unwrap_or(&collections[0]);
        self.resolve_href(&chosen.href)
    }

    fn calendar_query(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> String {
        let start = window_start.format(TIME_RANGE_FORMAT);
        let end = window_end.format(TIME_RANGE_FORMAT);
        format!(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <D:getetag/>
    <C:calendar-data/>
  </D:prop>
  <C:filter>
    <C:comp-filter name="VCALENDAR">
      <C:comp-filter name="VEVENT">
        <C:time-range start="{start}" end="{end}"/>
      </C:comp-filter>
    </C:comp-filter>
  </C:filter>
</C:calendar-query>"#
        )
    }
}

#[async_trait]
impl CalendarLocator for CaldavClient {
    async fn discover_calendar_url(&self, username: &str, password: &str) -> Result<String> {
        match self.walk_discovery_chain(username, password).await {
            Ok(url) => {
                info!(account = %redact_email(username), "calendar collection discovered");
                Ok(url)
            }
            Err(err @ ChimeError::Auth(_)) => Err(err),
            Err(err) => {
                let fallback = format!("{}/calendars/{}/", self.base_url, username);
                warn!(
                    error = %err,
                    account = %redact_email(username),
                    "discovery chain failed; probing well-known path"
                );
                self.dav_request("PROPFIND", &fallback, "0", LISTING_QUERY.to_string(), username, password)
                    .await?;
                Ok(fallback)
            }
        }
    }
}

#[async_trait]
impl CalendarSource for CaldavClient {
    #[instrument(skip(self, credentials))]
    async fn fetch_events(
        &self,
        credentials: &CalendarCredentials,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<FetchedEvent>> {
        let url = self.resolve_href(&credentials.calendar_url)?;
        let body = Self::calendar_query(window_start, window_end);
        let response = self
            .dav_request("REPORT", &url, "1", body, &credentials.username, &credentials.password)
            .await?;

        let mut events: Vec<FetchedEvent> = ics::calendar_data_blocks(&response)
            .iter()
            .flat_map(|block| ics::parse_events(block, self.tz))
            .filter(|event| event.ends_at > window_start && event.starts_at < window_end)
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));

        debug!(
            account = %redact_email(&credentials.username),
            count = events.len(),
            "fetched calendar events"
        );
        Ok(events)
    }
}

fn map_transport_error(err: reqwest::Error) -> ChimeError {
    let infra: InfraError = err.into();
    ChimeError::from(infra)
}

/// Log token for a calendar account that never exposes the address itself
fn redact_email(email: &str) -> String {
    const EMAIL_HASH_SALT: &[u8] = b"chime-caldav-email-salt";
    let mut hasher = Sha256::new();
    hasher.update(EMAIL_HASH_SALT);
    hasher.update(email.as_bytes());
    let digest = hasher.finalize();
    let hash = hex::encode(&digest[..4]);
    format!("email_hash={hash}")
}

struct CalendarCollection {
    href: String,
    display_name: String,
}

fn principal_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?s)<(?:[A-Za-z][\w.-]*:)?current-user-principal[^>]*>.*?<(?:[A-Za-z][\w.-]*:)?href[^>]*>(.*?)</(?:[A-Za-z][\w.-]*:)?href\s*>",
        )
        .expect("principal regex should compile")
    })
}

fn home_set_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?s)<(?:[A-Za-z][\w.-]*:)?calendar-home-set[^>]*>.*?<(?:[A-Za-z][\w.-]*:)?href[^>]*>(.*?)</(?:[A-Za-z][\w.-]*:)?href\s*>",
        )
        .expect("home set regex should compile")
    })
}

fn response_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)<(?:[A-Za-z][\w.-]*:)?response[\s>].*?</(?:[A-Za-z][\w.-]*:)?response\s*>")
            .expect("response regex should compile")
    })
}

fn href_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)<(?:[A-Za-z][\w.-]*:)?href[^>]*>(.*?)</(?:[A-Za-z][\w.-]*:)?href\s*>")
            .expect("href regex should compile")
    })
}

fn displayname_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?s)<(?:[A-Za-z][\w.-]*:)?displayname[^>]*>(.*?)</(?:[A-Za-z][\w.-]*:)?displayname\s*>",
        )
        .expect("displayname regex should compile")
    })
}

/// `<calendar/>` inside resourcetype; the trailing boundary keeps
/// `calendar-data` from matching
fn calendar_type_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<(?:[A-Za-z][\w.-]*:)?calendar\s*/?\s*>").unwrap())
}

fn element_href(xml: &str, element: &Regex) -> Option<String> {
    element
        .captures(xml)
        .map(|caps| caps[1].trim().to_string())
        .filter(|href| !href.is_empty())
}

/// Pull the calendar collections out of a Depth-1 PROPFIND multistatus
fn calendar_collections(xml: &str) -> Vec<CalendarCollection> {
    response_regex()
        .find_iter(xml)
        .filter_map(|m| {
            let block = m.as_str();
            if !calendar_type_regex().is_match(block) {
                return None;
            }
            let href = href_regex().captures(block).map(|caps| caps[1].trim().to_string())?;
            if href.is_empty() {
                return None;
            }
            let display_name = displayname_regex()
                .captures(block)
                .map(|caps| caps[1].trim().to_string())
                .unwrap_or_default();
            Some(CalendarCollection { href, display_name })
        })
        .collect()
}
