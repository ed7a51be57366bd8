// src/lookup/mod.rs
pub mod providers;
pub mod registry;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Failure of a single lookup. Always isolated to its subscription: the
/// dispatcher logs it and carries on with the rest of the cycle.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no lookup capability registered for source key '{0}'")]
    UnregisteredSource(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("lookup timed out after {0}s")]
    TimedOut(u64),
}

fn default_instock() -> i32 {
    1
}

/// One raw entry returned by a source for a search term, before it is
/// tagged with item/source/snapshot identity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawHit {
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_instock")]
    pub instock: i32,
}

/// Externally supplied behavior: given search text, return raw entries for
/// one source. Possibly slow, possibly failing; the dispatcher treats it as
/// an opaque black box.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<RawHit>, LookupError>;

    /// Short stable key this capability serves; selects it in the registry.
    fn key(&self) -> &str;

    /// Human-readable source name, for logs.
    fn name(&self) -> &str;
}

/// Normalize a title coming back from a shop endpoint: decode HTML
/// entities, strip tags, collapse whitespace, cap at 250 chars.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    if out.chars().count() > 250 {
        out = out.chars().take(250).collect();
    }

    out
}
