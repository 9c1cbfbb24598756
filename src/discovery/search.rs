// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Property tree search for sensor-shaped subtrees

use std::fmt::Write;

use tracing::debug;

use crate::registry::{PropertyTree, PropertyValue};

/// Key tokens for the primary, case-sensitive scan
pub const SENSOR_TOKENS: [&str; 4] = ["AOP", "Sensor", "accel", "gyro"];

/// Key tokens for the secondary, case-insensitive diagnostic scan
pub const DIAGNOSTIC_TOKENS: [&str; 3] = ["accel", "gyro", "sensor"];

/// Arrays at least this long are summarized without their elements
const DUMP_ARRAY_LIMIT: usize = 10;

/// How keys are compared against tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// Exact substring match
    Sensitive,
    /// Substring match ignoring ASCII and Unicode case
    Insensitive,
}

/// Depth-first, pre-order search over a property tree
///
/// A key matches when it contains any token. The first matching key whose
/// value is a mapping wins; matching scalars are logged and skipped. The
/// search holds no state between calls.
#[derive(Debug, Clone)]
pub struct PropertySearch {
    tokens: Vec<String>,
    case: CaseMode,
}

impl PropertySearch {
    /// Search for keys containing any of `tokens`
    pub fn new<S: AsRef<str>>(tokens: &[S], case: CaseMode) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| match case {
                CaseMode::Sensitive => t.as_ref().to_string(),
                CaseMode::Insensitive => t.as_ref().to_lowercase(),
            })
            .collect();
        Self { tokens, case }
    }

    /// The primary scan used to decide whether a sensor exists
    pub fn primary() -> Self {
        Self::new(&SENSOR_TOKENS, CaseMode::Sensitive)
    }

    /// The diagnostic scan run over fallback candidates
    pub fn diagnostic() -> Self {
        Self::new(&DIAGNOSTIC_TOKENS, CaseMode::Insensitive)
    }

    /// Whether `key` contains one of the tokens
    pub fn matches_key(&self, key: &str) -> bool {
        match self.case {
            CaseMode::Sensitive => self.tokens.iter().any(|t| key.contains(t.as_str())),
            CaseMode::Insensitive => {
                let key = key.to_lowercase();
                self.tokens.iter().any(|t| key.contains(t.as_str()))
            }
        }
    }

    /// First matching nested mapping in pre-order, if any
    pub fn search<'t>(&self, tree: &'t PropertyTree) -> Option<&'t PropertyTree> {
        // Explicit stack: registry trees have no depth bound.
        let mut stack = vec![tree.entries().iter()];

        while let Some(level) = stack.last_mut() {
            let Some((key, value)) = level.next() else {
                stack.pop();
                continue;
            };
            let nested = value.as_tree();

            if self.matches_key(key) {
                debug!("Sensor-related key: {}", key);
                match nested {
                    Some(subtree) => return Some(subtree),
                    None => debug!("   value: {}", value),
                }
            }

            if let Some(subtree) = nested {
                stack.push(subtree.entries().iter());
            }
        }

        None
    }

    /// Matching keys at the top level of `tree`, in order
    pub fn matching_keys<'t>(&self, tree: &'t PropertyTree) -> Vec<(&'t str, &'t PropertyValue)> {
        tree.iter().filter(|(key, _)| self.matches_key(key)).collect()
    }
}

impl Default for PropertySearch {
    fn default() -> Self {
        Self::primary()
    }
}

/// Indented multi-line rendering of a property tree for trace logs
pub fn dump_tree(tree: &PropertyTree) -> String {
    let mut out = String::new();
    dump_level(tree, 0, &mut out);
    out
}

fn dump_level(tree: &PropertyTree, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    for (key, value) in tree.iter() {
        match value {
            PropertyValue::Tree(nested) => {
                let _ = writeln!(out, "{}{}:", indent, key);
                dump_level(nested, level + 1, out);
            }
            PropertyValue::Array(items) => {
                let _ = writeln!(out, "{}{}: [{} items]", indent, key, items.len());
                if items.len() < DUMP_ARRAY_LIMIT {
                    for (index, item) in items.iter().enumerate() {
                        let _ = writeln!(out, "{}  [{}]: {}", indent, index, item);
                    }
                }
            }
            _ => {
                let _ = writeln!(out, "{}{}: {}", indent, key, value);
            }
        }
    }
}
