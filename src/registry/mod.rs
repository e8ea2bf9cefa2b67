//! # Tool Dispatch Registry
//!
//! Maps a tool identifier coming off the agent stream to exactly one
//! [`ToolDescriptor`]. Lookup is driven entirely by the rows in
//! [`catalog::BUILTIN_TOOLS`]; adding a tool means adding a row.
//!
//! Precedence is exact > prefix > set membership > fallback. Within one
//! match kind the first registered row wins.

pub mod catalog;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::blockchain::models::IntentKind;
use crate::error::UnknownToolError;

/// Stream part types carry this prefix in front of the tool identifier.
pub const TOOL_PART_PREFIX: &str = "tool-";

/// How a registry row matches an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "matchKind", content = "match", rename_all = "kebab-case")]
pub enum MatchRule {
    Exact(&'static str),
    Prefix(&'static str),
    SetMembership(&'static [&'static str]),
    Fallback,
}

/// One registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    #[serde(flatten)]
    pub rule: MatchRule,
    pub loading_label: &'static str,
    pub renderer_id: &'static str,
    /// Transaction shape this tool's output becomes, for action tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_kind: Option<IntentKind>,
    pub produces_transaction: bool,
}

impl ToolDescriptor {
    pub const fn read(rule: MatchRule, loading_label: &'static str, renderer_id: &'static str) -> Self {
        Self {
            rule,
            loading_label,
            renderer_id,
            intent_kind: None,
            produces_transaction: false,
        }
    }

    pub const fn action(
        rule: MatchRule,
        loading_label: &'static str,
        renderer_id: &'static str,
        intent_kind: IntentKind,
    ) -> Self {
        Self {
            rule,
            loading_label,
            renderer_id,
            intent_kind: Some(intent_kind),
            produces_transaction: true,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.rule, MatchRule::Fallback)
    }
}

/// Returned for identifiers no row matches.
pub const FALLBACK: ToolDescriptor = ToolDescriptor::read(MatchRule::Fallback, "Working...", "raw-json");

/// Strips the stream's `tool-` prefix if present.
pub fn normalize_identifier(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    trimmed.strip_prefix(TOOL_PART_PREFIX).unwrap_or(trimmed)
}

/// Lookup table over descriptor rows.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    rows: Vec<ToolDescriptor>,
    exact: HashMap<&'static str, usize>,
    members: HashMap<&'static str, usize>,
    prefixes: Vec<(&'static str, usize)>,
}

impl ToolRegistry {
    pub fn new(rows: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut registry = Self {
            rows: Vec::new(),
            exact: HashMap::new(),
            members: HashMap::new(),
            prefixes: Vec::new(),
        };
        for row in rows {
            registry.register(row);
        }
        registry
    }

    /// Registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self::new(catalog::BUILTIN_TOOLS.iter().copied())
    }

    /// Appends a row. Earlier rows keep priority within the same match kind.
    pub fn register(&mut self, row: ToolDescriptor) {
        let index = self.rows.len();
        match row.rule {
            MatchRule::Exact(name) => {
                self.exact.entry(name).or_insert(index);
            }
            MatchRule::Prefix(prefix) => self.prefixes.push((prefix, index)),
            MatchRule::SetMembership(names) => {
                for name in names {
                    self.members.entry(*name).or_insert(index);
                }
            }
            MatchRule::Fallback => return,
        }
        self.rows.push(row);
    }

    /// Resolves an identifier, reporting misses.
    pub fn try_resolve(&self, identifier: &str) -> Result<&ToolDescriptor, UnknownToolError> {
        let name = normalize_identifier(identifier);

        let index = self
            .exact
            .get(name)
            .copied()
            .or_else(|| {
                self.prefixes
                    .iter()
                    .find(|(prefix, _)| name.starts_with(prefix))
                    .map(|(_, index)| *index)
            })
            .or_else(|| self.members.get(name).copied());

        index
            .map(|i| &self.rows[i])
            .ok_or_else(|| UnknownToolError(identifier.to_string()))
    }

    /// Resolves an identifier. Never fails; misses get [`FALLBACK`].
    pub fn resolve(&self, identifier: &str) -> &ToolDescriptor {
        match self.try_resolve(identifier) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!(%err, "falling back to raw-json renderer");
                &FALLBACK
            }
        }
    }

    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
