//! iCalendar parsing for CalDAV responses.
//!
//! The REPORT multistatus body embeds one iCalendar document per matching
//! resource inside `calendar-data` elements. This module pulls those
//! documents out, unfolds them per RFC 5545 and reads the VEVENT
//! properties the reminder pipeline needs. Anything it cannot interpret is
//! skipped with a debug log; one malformed event must not poison the rest
//! of the fetch.

use std::str::FromStr;
use std::sync::OnceLock;

use chime_core::calendar_ports::FetchedEvent;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::debug;

const FALLBACK_TITLE: &str = "Untitled event";

/// Extract the embedded iCalendar documents from a multistatus body.
///
/// Namespace prefixes vary between servers (`C:`, `cal:`, none), so the
/// element is matched on its local name. The content arrives XML-escaped
/// and is unescaped here.
pub fn calendar_data_blocks(multistatus: &str) -> Vec<String> {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| {
        Regex::new(
            r"(?s)<(?:[A-Za-z][\w.-]*:)?calendar-data[^>]*>(.*?)</(?:[A-Za-z][\w.-]*:)?calendar-data\s*>",
        )
        .expect("calendar-data regex should compile")
    });

    block
        .captures_iter(multistatus)
        .map(|caps| unescape_xml(caps[1].trim()))
        .filter(|data| !data.is_empty())
        .collect()
}

/// RFC 5545 line unfolding: a line starting with a space or tab continues
/// the previous one.
pub fn unfold(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        if let Some(continuation) = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }
        lines.push(line.to_string());
    }
    lines.join("\n")
}

/// Parse every usable VEVENT out of one iCalendar document.
///
/// Events with no UID or no readable DTSTART are skipped, as are events
/// whose STATUS is CANCELLED. A missing DTEND defaults to one hour after
/// the start. `default_tz` interprets floating and all-day times.
pub fn parse_events(ics: &str, default_tz: Tz) -> Vec<FetchedEvent> {
    let unfolded = unfold(ics);
    let mut events = Vec::new();
    let mut current: Option<VEventAccumulator> = None;
    let mut in_alarm = false;

    for line in unfolded.lines() {
        let line = line.trim_end_matches('\r');
        match line {
            "BEGIN:VEVENT" => {
                current = Some(VEventAccumulator::default());
                in_alarm = false;
            }
            "END:VEVENT" => {
                if let Some(acc) = current.take() {
                    if let Some(event) = acc.build(default_tz) {
                        events.push(event);
                    }
                }
            }
            "BEGIN:VALARM" => in_alarm = true,
            "END:VALARM" => in_alarm = false,
            _ => {
                if let (Some(acc), Some(property)) = (current.as_mut(), parse_property(line)) {
                    acc.absorb(property, in_alarm);
                }
            }
        }
    }

    events
}

/// One `NAME;PARAM=X:value` content line
struct Property<'a> {
    name: String,
    params: &'a str,
    value: &'a str,
}

fn parse_property(line: &str) -> Option<Property<'_>> {
    let colon = line.find(':')?;
    let (head, value) = line.split_at(colon);
    let value = &value[1..];
    let (name, params) = match head.find(';') {
        Some(semi) => (&head[..semi], &head[semi + 1..]),
        None => (head, ""),
    };
    Some(Property { name: name.to_ascii_uppercase(), params, value })
}

/// Look up a parameter value such as `TZID` in a property's parameter list
fn param_value<'a>(params: &'a str, key: &str) -> Option<&'a str> {
    params.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        name.eq_ignore_ascii_case(key).then_some(value)
    })
}

#[derive(Default)]
struct VEventAccumulator {
    uid: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    status: Option<String>,
    dtstart: Option<(String, String)>,
    dtend: Option<(String, String)>,
    triggers: Vec<(String, String)>,
}

impl VEventAccumulator {
    fn absorb(&mut self, property: Property<'_>, in_alarm: bool) {
        if in_alarm {
            if property.name == "TRIGGER" {
                self.triggers.push((property.params.to_string(), property.value.to_string()));
            }
            return;
        }

        match property.name.as_str() {
            "UID" => self.uid = Some(property.value.trim().to_string()),
            "SUMMARY" => self.summary = Some(unescape_text(property.value)),
            "LOCATION" => self.location = Some(unescape_text(property.value)),
            "STATUS" => self.status = Some(property.value.trim().to_ascii_uppercase()),
            "DTSTART" => {
                self.dtstart = Some((property.params.to_string(), property.value.to_string()));
            }
            "DTEND" => {
                self.dtend = Some((property.params.to_string(), property.value.to_string()));
            }
            _ => {}
        }
    }

    fn build(self, default_tz: Tz) -> Option<FetchedEvent> {
        let uid = self.uid.filter(|uid| !uid.is_empty())?;

        if self.status.as_deref() == Some("CANCELLED") {
            debug!(uid = %uid, "skipping cancelled event");
            return None;
        }

        let (start_params, start_value) = self.dtstart.as_ref()?;
        let Some(starts_at) = parse_datetime(start_value, start_params, default_tz) else {
            debug!(uid = %uid, value = %start_value, "skipping event with unreadable DTSTART");
            return None;
        };

        let ends_at = self
            .dtend
            .as_ref()
            .and_then(|(params, value)| parse_datetime(value, params, default_tz))
            .unwrap_or_else(|| starts_at + Duration::hours(1));

        let alarm_at = self
            .triggers
            .iter()
            .filter_map(|(params, value)| parse_trigger(value, params, starts_at, default_tz))
            .min();

        let title = self.summary.filter(|s| !s.trim().is_empty());
        let location = self.location.filter(|s| !s.trim().is_empty());

        Some(FetchedEvent {
            uid,
            title: title.unwrap_or_else(|| FALLBACK_TITLE.to_string()),
            starts_at,
            ends_at,
            location,
            alarm_at,
        })
    }
}

/// Interpret an iCalendar date or date-time in one of its four forms:
/// `...Z` (UTC), `TZID=` qualified, floating (configured zone) and
/// `VALUE=DATE` all-day (local midnight).
fn parse_datetime(value: &str, params: &str, default_tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if param_value(params, "VALUE") == Some("DATE") || (value.len() == 8 && !value.contains('T')) {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return default_tz
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }

    if let Some(utc_value) = value.strip_suffix('Z') {
        let naive = parse_naive(utc_value)?;
        return Some(Utc.from_utc_datetime(&naive));
    }

    let naive = parse_naive(value)?;
    let zone = param_value(params, "TZID")
        .and_then(|tzid| Tz::from_str(tzid).ok())
        .unwrap_or(default_tz);
    zone.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M"))
        .ok()
}

/// Resolve a VALARM TRIGGER into an absolute fire time.
///
/// Absolute `VALUE=DATE-TIME` triggers parse as date-times; everything
/// else is treated as an ISO 8601 duration relative to DTSTART, negative
/// meaning before the start.
fn parse_trigger(
    value: &str,
    params: &str,
    starts_at: DateTime<Utc>,
    default_tz: Tz,
) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if param_value(params, "VALUE") == Some("DATE-TIME") || !value.contains('P') {
        return parse_datetime(value, params, default_tz);
    }

    parse_iso_duration(value).map(|offset| starts_at + offset)
}

/// Parse the duration subset triggers use: `[+|-]P[nD][T[nH][nM][nS]]`
fn parse_iso_duration(value: &str) -> Option<Duration> {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    let duration = DURATION.get_or_init(|| {
        Regex::new(r"^([+-]?)P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration regex should compile")
    });

    let caps = duration.captures(value)?;
    let component = |index: usize| -> i64 {
        caps.get(index).and_then(|m| m.as_str().parse::<i64>().ok()).unwrap_or(0)
    };

    let mut total = Duration::days(component(2))
        + Duration::hours(component(3))
        + Duration::minutes(component(4))
        + Duration::seconds(component(5));
    if caps.get(1).is_some_and(|m| m.as_str() == "-") {
        total = -total;
    }
    Some(total)
}

/// Undo RFC 5545 text escaping (`\\n`, `\\,`, `\\;`, `\\\\`)
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#13;", "\r")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}
