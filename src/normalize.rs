//! Turns raw snapshot records into canonical [`Post`]s.
//!
//! Provider records use inconsistent key spellings ("Share URL", "ShareLink",
//! "shareLink", ...). Every logical field has an ordered list of extractors;
//! the first one that yields a non-empty value wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{MediaType, Post};

pub const TEXT_PREVIEW_LIMIT: usize = 500;
pub const ELLIPSIS: &str = "...";
pub const EMPTY_TEXT_PLACEHOLDER: &str = "[No text content]";

pub type Record = Map<String, Value>;

/// A pure lookup from a raw record to an optional field value.
pub type Extractor = fn(&Record) -> Option<String>;

macro_rules! keys_extractor {
    ($name:ident, [$($key:literal),+ $(,)?]) => {
        fn $name(record: &Record) -> Option<String> {
            [$($key),+].iter().find_map(|k| record.get(*k).and_then(value_text))
        }
    };
}

macro_rules! loose_extractor {
    ($name:ident, [$($key:literal),+ $(,)?]) => {
        fn $name(record: &Record) -> Option<String> {
            [$($key),+].iter().find_map(|k| loose_lookup(record, k))
        }
    };
}

keys_extractor!(share_url_keys, ["ShareLink", "Share URL", "Share Link", "shareLink", "share_url", "SharedUrl", "URL", "url"]);
loose_extractor!(share_url_loose, ["sharelink", "shareurl", "permalink"]);

keys_extractor!(date_keys, ["Date", "ShareDate", "Share Date", "date", "created_at", "createdAt"]);
loose_extractor!(date_loose, ["date", "sharedate", "createdat"]);

keys_extractor!(text_keys, ["ShareCommentary", "Share Commentary", "Commentary", "commentary", "Text", "text"]);
loose_extractor!(text_loose, ["sharecommentary", "commentary", "text"]);

keys_extractor!(media_url_keys, ["MediaUrl", "Media URL", "MediaURL", "mediaUrl", "media_url", "Media"]);
loose_extractor!(media_url_loose, ["mediaurl", "media"]);

keys_extractor!(media_type_keys, ["MediaType", "Media Type", "mediaType", "media_type"]);
loose_extractor!(media_type_loose, ["mediatype"]);

pub const SHARE_URL: &[Extractor] = &[share_url_keys, share_url_loose];
pub const SHARE_DATE: &[Extractor] = &[date_keys, date_loose];
pub const TEXT_BODY: &[Extractor] = &[text_keys, text_loose];
pub const MEDIA_URL: &[Extractor] = &[media_url_keys, media_url_loose];
pub const MEDIA_TYPE: &[Extractor] = &[media_type_keys, media_type_loose];

/// First non-empty value produced by `extractors`, in order.
pub fn first_match(record: &Record, extractors: &[Extractor]) -> Option<String> {
    extractors.iter().find_map(|extract| extract(record))
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Match a key ignoring case, spaces, underscores and hyphens.
fn loose_lookup(record: &Record, folded: &str) -> Option<String> {
    record
        .iter()
        .find(|(k, _)| fold_key(k) == folded)
        .and_then(|(_, v)| value_text(v))
}

static URN_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"activity[-:](\d+)").unwrap(), "urn:li:activity:"),
        (Regex::new(r"ugcPost[-:](\d+)").unwrap(), "urn:li:ugcPost:"),
        (Regex::new(r"share[-:](\d+)").unwrap(), "urn:li:share:"),
    ]
});

/// Canonical URN for a permalink, or a synthetic one unique within a fetch.
pub fn derive_post_urn(permalink: &str, index: usize, now: DateTime<Utc>) -> String {
    for (re, prefix) in URN_PATTERNS.iter() {
        if let Some(caps) = re.captures(permalink) {
            return format!("{}{}", prefix, &caps[1]);
        }
    }
    format!(
        "urn:li:activity:synthetic-{}-{}",
        now.timestamp_millis(),
        index
    )
}

/// Epoch millis for a provider date, or `None` when it cannot be parsed.
pub fn parse_created_at(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = day.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        // Ten digits or fewer is seconds.
        let millis = if epoch.unsigned_abs() < 10_000_000_000 {
            epoch.checked_mul(1000)?
        } else {
            epoch
        };
        // Reject instants chrono cannot represent.
        return Utc.timestamp_millis_opt(millis).single().map(|_| millis);
    }
    None
}

pub fn text_preview(text: Option<&str>) -> String {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return EMPTY_TEXT_PLACEHOLDER.to_string();
    };
    match text.char_indices().nth(TEXT_PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "m4v"];

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn classify_media(explicit: Option<&str>, media_url: Option<&str>) -> MediaType {
    if let Some(kind) = explicit {
        let kind = kind.trim().to_ascii_lowercase();
        return match kind.as_str() {
            "" | "none" => MediaType::None,
            k if k.contains("image") || k.contains("photo") => MediaType::Image,
            k if k.contains("video") => MediaType::Video,
            _ => MediaType::UrnReference,
        };
    }

    let Some(url) = media_url else {
        return MediaType::None;
    };
    let ext = url_extension(url);
    let lower = url.to_ascii_lowercase();
    if ext.as_deref().is_some_and(|e| IMAGE_EXTENSIONS.contains(&e)) || lower.contains("image") {
        MediaType::Image
    } else if ext.as_deref().is_some_and(|e| VIDEO_EXTENSIONS.contains(&e)) || lower.contains("video") {
        MediaType::Video
    } else {
        MediaType::UrnReference
    }
}

/// Normalize one raw record. Returns `None` for records without a permalink
/// and for values that are not JSON objects.
pub fn normalize_record(raw: &Value, index: usize, now: DateTime<Utc>) -> Option<Post> {
    let Some(record) = raw.as_object() else {
        debug!(index, "skipping non-object snapshot record");
        return None;
    };

    let Some(permalink) = first_match(record, SHARE_URL) else {
        debug!(index, "skipping snapshot record without share URL");
        return None;
    };

    let created_at_ms = first_match(record, SHARE_DATE)
        .and_then(|raw| parse_created_at(&raw))
        .unwrap_or_else(|| now.timestamp_millis());

    let text = first_match(record, TEXT_BODY);
    let media_url = first_match(record, MEDIA_URL);
    let explicit_type = first_match(record, MEDIA_TYPE);
    let media_type = classify_media(explicit_type.as_deref(), media_url.as_deref());

    Some(Post {
        post_urn: derive_post_urn(&permalink, index, now),
        created_at_ms,
        text_preview: text_preview(text.as_deref()),
        media_type,
        media_asset_urn: media_url.filter(|_| media_type != MediaType::None),
        permalink,
    })
}
