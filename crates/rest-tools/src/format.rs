//! Bounded tool output.
//!
//! Every response is rendered either as indented JSON or as caller-supplied markdown and then
//! cut to the configured character budget. Over-budget output gets [`TRUNCATION_NOTICE`]
//! appended so the caller knows to narrow the request.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::debug;

use crate::config::OutputConfig;
use crate::normalize::CanonicalRecord;
use crate::pagination::PaginationWindow;

/// Default maximum response size in characters.
pub const CHARACTER_LIMIT: usize = 25_000;

/// Appended to output cut at the character budget.
pub const TRUNCATION_NOTICE: &str = "\n\n[Response truncated: exceeded the character limit. Use the `limit` and `offset` parameters or add filters to narrow the results.]";

const DROPPED_ITEMS_MESSAGE: &str =
    "Response exceeded the character limit; trailing items were omitted. Use `next_offset` to continue.";

/// Output mode requested by the tool caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown response format '{other}' (expected 'markdown' or 'json')"
            )),
        }
    }
}

impl ResponseFormat {
    /// Read `response_format` from tool arguments, defaulting to markdown.
    #[must_use]
    pub fn from_arguments(arguments: &Value) -> Self {
        arguments
            .get("response_format")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// How a `json` rendering is brought under the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StructuredTruncation {
    /// Plain character cut. The result is generally not valid JSON.
    #[default]
    Raw,
    /// Drop trailing `items` until the JSON fits, rewriting the window fields. Falls back to
    /// `Raw` when not even one item fits.
    DropTrailingItems,
}

/// Renders canonical values into bounded text. Holds no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    character_limit: usize,
    structured_truncation: StructuredTruncation,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(&OutputConfig::default())
    }
}

impl OutputFormatter {
    #[must_use]
    pub fn new(cfg: &OutputConfig) -> Self {
        Self {
            character_limit: cfg.character_limit,
            structured_truncation: cfg.structured_truncation,
        }
    }

    #[must_use]
    pub fn character_limit(&self) -> usize {
        self.character_limit
    }

    /// Render `value` in the requested mode, bounded to the character budget.
    ///
    /// `render_markdown` is only invoked in [`ResponseFormat::Markdown`] mode.
    pub fn format<T, F>(&self, value: &T, render_markdown: F, mode: ResponseFormat) -> String
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        match mode {
            ResponseFormat::Markdown => self.truncate(render_markdown(value)),
            ResponseFormat::Json => match serde_json::to_value(value) {
                Ok(v) => self.format_json(v),
                Err(e) => format!("Error: failed to serialize response: {e}"),
            },
        }
    }

    fn format_json(&self, value: Value) -> String {
        let text = to_pretty(&value);
        if char_len(&text) <= self.character_limit {
            return text;
        }

        if self.structured_truncation == StructuredTruncation::DropTrailingItems
            && let Some(fitted) = self.drop_trailing_items(&value)
        {
            return fitted;
        }

        self.truncate(text)
    }

    /// Largest non-empty prefix of `items` whose rendering fits, found by binary search.
    fn drop_trailing_items(&self, value: &Value) -> Option<String> {
        let total_items = value.get("items").and_then(Value::as_array)?.len();

        let mut best: Option<String> = None;
        let (mut lo, mut hi) = (1usize, total_items);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let text = to_pretty(&keep_leading_items(value, mid));
            if char_len(&text) <= self.character_limit {
                best = Some(text);
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if let Some(kept) = &best {
            debug!(
                total_items,
                chars = char_len(kept),
                limit = self.character_limit,
                "dropped trailing items to fit structured output"
            );
        }
        best
    }

    /// Cut `text` to the budget and append the notice when it is over.
    #[must_use]
    pub fn truncate(&self, text: String) -> String {
        truncate_to_limit(text, self.character_limit)
    }
}

/// Character (not byte) cut at `limit`, followed by [`TRUNCATION_NOTICE`].
#[must_use]
pub fn truncate_to_limit(text: String, limit: usize) -> String {
    let len = char_len(&text);
    if len <= limit {
        return text;
    }
    debug!(chars = len, limit, "truncating tool output");
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(TRUNCATION_NOTICE);
    out
}

fn keep_leading_items(value: &Value, keep: usize) -> Value {
    let mut out = value.clone();
    let Some(obj) = out.as_object_mut() else {
        return out;
    };
    if let Some(items) = obj.get_mut("items").and_then(Value::as_array_mut) {
        items.truncate(keep);
    }
    if obj.contains_key("count") {
        obj.insert("count".to_string(), json!(keep));
    }
    if let Some(offset) = obj.get("offset").and_then(Value::as_u64) {
        let next = offset.saturating_add(keep as u64);
        obj.insert("has_more".to_string(), json!(true));
        obj.insert("next_offset".to_string(), json!(next));
    }
    obj.insert("truncated".to_string(), json!(true));
    obj.insert("truncation_message".to_string(), json!(DROPPED_ITEMS_MESSAGE));
    out
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Generic markdown for a single record: a heading and one bullet per field.
#[must_use]
pub fn markdown_record(title: &str, record: &CanonicalRecord) -> String {
    let mut out = format!("## {title}\n\n");
    for (key, value) in record.fields() {
        out.push_str(&format!("- **{key}**: {}\n", display_value(value)));
    }
    out
}

/// Generic markdown for a page of records with a pagination footer.
pub fn markdown_collection<F>(title: &str, window: &PaginationWindow, render_item: F) -> String
where
    F: Fn(&CanonicalRecord) -> String,
{
    if window.items.is_empty() {
        return if window.offset > 0 && window.total > 0 {
            format!(
                "# {title}\n\nNo results at offset {} (total: {}).\n",
                window.offset, window.total
            )
        } else {
            format!("# {title}\n\nNo results found.\n")
        };
    }

    let first = window.offset.saturating_add(1);
    let last = window.offset.saturating_add(window.count);
    let mut out = format!(
        "# {title}\n\nShowing {first}-{last} of {} result(s).\n\n",
        window.total
    );
    for item in &window.items {
        out.push_str(render_item(item).trim_end());
        out.push_str("\n\n");
    }
    if let Some(next) = window.next_offset {
        out.push_str(&format!(
            "_More results available. Use `offset={next}` to see the next page._\n"
        ));
    }
    out
}

/// Scalars render bare; nested values as compact JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "_none_".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
