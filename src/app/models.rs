//! Data models and raw-response validation
//!
//! Upstream responses arrive as loosely typed JSON. The parsers here check
//! them against an explicit schema and turn them into [`HotListItem`] and
//! [`ItemDetail`] values; any structural problem is reported as a reason
//! string that the orchestrator surfaces as a data-integrity failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::crawler;

/// One ranked entry of the hot list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotListItem {
    /// Upstream rank; authoritative, never re-sorted
    pub position: u32,
    pub title: String,
    pub item_url: String,
    pub popularity: u64,
    pub views: u64,
    /// Upstream identifier used for detail lookups
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ItemDetail>,
}

impl HotListItem {
    /// Copy of this item with `detail` attached
    ///
    /// The share URL of the detail becomes the item URL.
    pub fn with_detail(&self, detail: ItemDetail) -> Self {
        Self {
            item_url: detail.share_url.clone(),
            detail: Some(detail),
            ..self.clone()
        }
    }

    /// Downloadable media URL, if the detail carries one
    pub fn media_url(&self) -> Option<&str> {
        self.detail.as_ref()?.media_url.as_deref()
    }
}

/// Per-item detail record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    /// Identifier of the media item behind the entry
    pub media_id: String,
    pub description: String,
    pub share_url: String,
    pub media_url: Option<String>,
}

/// Validate a raw hot-list response
///
/// Expects `data.word_list` to be a non-empty array whose entries all carry
/// `sentence_id`, `word`, `position`, `hot_value` and `view_count`. Upstream
/// order is preserved.
pub fn parse_hot_list(raw: &Value, hot_list_page_url: &str) -> Result<Vec<HotListItem>, String> {
    let entries = raw
        .get("data")
        .and_then(|data| data.get("word_list"))
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no data.word_list array".to_string())?;

    if entries.is_empty() {
        return Err("hot list is empty".to_string());
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            parse_hot_list_entry(entry, hot_list_page_url)
                .map_err(|reason| format!("entry {}: {}", index, reason))
        })
        .collect()
}

fn parse_hot_list_entry(entry: &Value, hot_list_page_url: &str) -> Result<HotListItem, String> {
    if !entry.is_object() {
        return Err("not an object".to_string());
    }

    let item_id = field_as_id(entry, "sentence_id")?;
    let raw_title = entry
        .get("word")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing string field 'word'".to_string())?;
    let title = clean_text(raw_title);
    if title.is_empty() {
        return Err("title is empty".to_string());
    }
    let title_chars = title.chars().count();
    if title_chars > crawler::MAX_TITLE_CHARS {
        return Err(format!(
            "title has {} characters, limit is {}",
            title_chars,
            crawler::MAX_TITLE_CHARS
        ));
    }

    let position = field_as_count(entry, "position")?;
    let position =
        u32::try_from(position).map_err(|_| format!("position {} out of range", position))?;
    let popularity = field_as_count(entry, "hot_value")?;
    let views = field_as_count(entry, "view_count")?;

    Ok(HotListItem {
        position,
        item_url: item_page_url(hot_list_page_url, &item_id, &title),
        title,
        popularity,
        views,
        item_id,
        detail: None,
    })
}

/// Validate a raw item-detail response
///
/// Expects an `aweme_detail` object with a non-empty `aweme_id`. The media
/// URL is optional and taken from the first bit-rate variant, falling back to
/// the plain play address.
pub fn parse_item_detail(raw: &Value, video_page_url: &str) -> Result<ItemDetail, String> {
    let detail = raw
        .get("aweme_detail")
        .filter(|detail| detail.is_object())
        .ok_or_else(|| "response has no aweme_detail object".to_string())?;

    let media_id = field_as_id(detail, "aweme_id")?;
    let description = detail
        .get("desc")
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default();

    let video = detail.get("video");
    let media_url = video
        .and_then(|video| video.pointer("/bit_rate/0/play_addr/url_list/0"))
        .or_else(|| video.and_then(|video| video.pointer("/play_addr/url_list/0")))
        .and_then(Value::as_str)
        .and_then(sanitize_url);

    Ok(ItemDetail {
        share_url: format!("{}/{}", video_page_url.trim_end_matches('/'), media_id),
        media_id,
        description,
        media_url,
    })
}

/// Normalize whitespace and strip invisible characters
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{2060}'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accept only http(s) URLs and remove characters that have no place in one
pub fn sanitize_url(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\'' | '<' | '>' | '`' | ' '))
        .collect();

    let parsed = url::Url::parse(&cleaned).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(cleaned),
        _ => None,
    }
}

/// Fallback item URL on the hot-list page
pub fn item_page_url(hot_list_page_url: &str, item_id: &str, title: &str) -> String {
    let encoded_title: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
    format!(
        "{}/{}/{}",
        hot_list_page_url.trim_end_matches('/'),
        item_id,
        encoded_title
    )
}

fn field_as_id(entry: &Value, field: &str) -> Result<String, String> {
    let id = match entry.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(format!("field '{}' is not a string or number", field)),
        None => return Err(format!("missing field '{}'", field)),
    };

    if id.is_empty() {
        Err(format!("field '{}' is empty", field))
    } else {
        Ok(id)
    }
}

fn field_as_count(entry: &Value, field: &str) -> Result<u64, String> {
    let value = entry
        .get(field)
        .ok_or_else(|| format!("missing field '{}'", field))?;

    let count = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    count.ok_or_else(|| format!("field '{}' must be a non-negative integer, got {}", field, value))
}
