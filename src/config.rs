// src/config.rs
//! Runtime configuration: env knobs plus a source-definition file.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::update::UpdateCfg;

const ENV_SOURCES_PATH: &str = "SOURCES_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub update: UpdateCfg,
    pub sources: Vec<SourceDef>,
}

/// One configured search source: the registry key, a display name, and the
/// shop search endpoint to query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDef {
    pub key: String,
    pub name: String,
    pub endpoint: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://price_tracker.db".to_string());
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());

        let concurrency: usize = std::env::var("UPDATE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);
        let lookup_timeout_secs: u64 = std::env::var("LOOKUP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let sources = load_sources_default()?;

        Ok(Self {
            database_url,
            bind_addr,
            update: UpdateCfg {
                concurrency: concurrency.max(1),
                lookup_timeout: Duration::from_secs(lookup_timeout_secs),
            },
            sources,
        })
    }
}

/// Load source definitions from an explicit path. Supports TOML or JSON.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceDef>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load source definitions using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// An absent file means no sources configured, which is fine.
pub fn load_sources_default() -> Result<Vec<SourceDef>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceDef>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<SourceDef>> {
    #[derive(Deserialize)]
    struct TomlSources {
        sources: Vec<SourceDef>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<SourceDef>> {
    let v: Vec<SourceDef> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim + lowercase keys, drop incomplete entries, dedup by key keeping
/// the first occurrence.
fn clean_list(items: Vec<SourceDef>) -> Vec<SourceDef> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let key = it.key.trim().to_ascii_lowercase();
        let name = it.name.trim().to_string();
        let endpoint = it.endpoint.trim().to_string();
        if key.is_empty() || endpoint.is_empty() {
            continue;
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        out.push(SourceDef {
            key,
            name,
            endpoint,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_formats_parse() {
        let toml = r#"
            [[sources]]
            key = "CCS"
            name = "CC Search"
            endpoint = "https://ccsearch.example/api/search"

            [[sources]]
            key = "ccs"
            name = "duplicate"
            endpoint = "https://dup.example"
        "#;
        let out = parse_toml(toml).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "ccs");
        assert_eq!(out[0].name, "CC Search");

        let json = r#"[{"key":" hw ","name":"HW Shop","endpoint":"https://hw.example/s"}]"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "hw");
    }

    #[test]
    fn entries_without_key_or_endpoint_are_dropped() {
        let json = r#"[
            {"key":"","name":"x","endpoint":"https://a"},
            {"key":"ok","name":"y","endpoint":"  "},
            {"key":"keep","name":"z","endpoint":"https://b"}
        ]"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "keep");
    }
}
