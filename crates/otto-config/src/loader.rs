// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority.  Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/otto/config.yaml"));
        paths.push(home.join(".config/otto/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("otto/config.yaml"));
        paths.push(cfg.join("otto/config.yml"));
    }

    // Workspace-local
    paths.push(PathBuf::from(".otto.yaml"));
    paths.push(PathBuf::from(".otto.yml"));
    paths.push(PathBuf::from("otto.yaml"));
    paths.push(PathBuf::from("otto.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files.
/// The `extra` argument may provide an explicit path supplied by the embedder.
///
/// After the merge, an `api_key_env` reference is resolved into
/// `model.api_key` (an explicit `api_key` in a file still wins), and a `~`
/// prefix in path-like values is expanded.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_yaml(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_yaml(&mut merged, read_layer(p)?);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    resolve_api_key(&mut config);
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<serde_yaml::Value> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let text = std::fs::read_to_string(&expanded).with_context(|| format!("reading {expanded}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {expanded}"))
}

/// Resolve `model.api_key_env` into `model.api_key` unless a key was given
/// explicitly.  A missing environment variable is not an error here — the
/// stream adapter surfaces auth failures when the key is actually needed.
fn resolve_api_key(config: &mut Config) {
    if config.model.api_key.is_some() {
        return;
    }
    if let Some(var) = &config.model.api_key_env {
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => config.model.api_key = Some(key),
            _ => debug!(var = %var, "api_key_env set but variable is empty or unset"),
        }
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
