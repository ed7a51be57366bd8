// src/lookup/providers/shop_api.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::lookup::{normalize_title, LookupError, PriceLookup, RawHit};

/// JSON storefront search provider: `GET {endpoint}?q={term}` returning
/// either a bare array of entries or `{"results": [...]}`. One
/// implementation serves any number of shops; each instance is registered
/// under its own source key.
pub struct ShopApi {
    key: String,
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

// Tolerant payload shapes seen across shop search endpoints.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<RawHit>),
    Wrapped { results: Vec<RawHit> },
}

/// Parse a search payload into hits. Pure so fixtures can exercise it
/// without HTTP. Entries with an empty title or a negative/non-finite
/// price are malformed and skipped.
pub fn parse_payload(body: &str) -> Result<Vec<RawHit>, LookupError> {
    let payload: Payload =
        serde_json::from_str(body).map_err(|e| LookupError::MalformedPayload(e.to_string()))?;
    let entries = match payload {
        Payload::Bare(v) => v,
        Payload::Wrapped { results } => results,
    };

    let mut out = Vec::with_capacity(entries.len());
    for mut hit in entries {
        hit.title = normalize_title(&hit.title);
        if hit.title.is_empty() {
            continue;
        }
        if hit.price < 0.0 || !hit.price.is_finite() {
            tracing::debug!(title = %hit.title, price = hit.price, "dropping entry with invalid price");
            continue;
        }
        out.push(hit);
    }
    Ok(out)
}

impl ShopApi {
    pub fn new(key: &str, name: &str, endpoint: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PriceLookup for ShopApi {
    async fn search(&self, term: &str) -> Result<Vec<RawHit>, LookupError> {
        let t0 = std::time::Instant::now();

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", term)])
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        let hits = parse_payload(&body)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("update_lookup_ms").record(ms);
        counter!("update_hits_total").increment(hits.len() as u64);

        Ok(hits)
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }
}
