//! Which remote paths a logical extraction pulls.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// Every entry of the device root
    All,
    /// Root entries minus the excluded folders (dev, proc, sys by default)
    ExceptExcluded,
    /// Only the curated list of forensically relevant locations
    Important,
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::ExceptExcluded => write!(f, "except-excluded"),
            Selection::Important => write!(f, "important"),
        }
    }
}

/// Names printed by `ls /` on the device.
pub fn parse_root_listing(stdout: &str) -> Vec<String> {
    stdout
        .split_whitespace()
        .filter(|name| *name != "." && *name != "..")
        .map(str::to_string)
        .collect()
}

/// Absolute form of a target path with duplicate and trailing slashes
/// removed. Returns `None` for empty input or paths that climb with `..`.
pub fn normalize_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            other => parts.push(other),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

/// Build the sorted, de-duplicated target list for `selection`.
pub fn select_targets(
    selection: Selection,
    root_entries: &[String],
    excluded: &[String],
    important: &[String],
) -> Vec<String> {
    let excluded: BTreeSet<&str> = excluded
        .iter()
        .map(|name| name.trim_matches('/'))
        .collect();

    let chosen: Vec<&str> = match selection {
        Selection::All => root_entries.iter().map(String::as_str).collect(),
        Selection::ExceptExcluded => root_entries
            .iter()
            .map(String::as_str)
            .filter(|name| !excluded.contains(name.trim_matches('/')))
            .collect(),
        Selection::Important => important
            .iter()
            .map(String::as_str)
            .filter(|entry| {
                entry.starts_with('/') || root_entries.iter().any(|name| name.as_str() == *entry)
            })
            .collect(),
    };

    chosen
        .into_iter()
        .filter_map(normalize_target)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Operator-supplied targets, normalised the same way.
pub fn explicit_targets(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|path| {
            let normalized = normalize_target(path);
            if normalized.is_none() {
                log::warn!(target: "app", "Ignoring invalid target path {:?}", path);
            }
            normalized
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
