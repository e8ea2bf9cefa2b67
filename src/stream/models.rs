// src/stream/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::TOOL_PART_PREFIX;

/// Lifecycle of one tool invocation, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl LifecycleState {
    /// Position in the lifecycle. Both outcomes share the final rank.
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleState::InputStreaming => 0,
            LifecycleState::InputAvailable => 1,
            LifecycleState::OutputAvailable | LifecycleState::OutputError => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Reasoning,
    /// Identifier without the `tool-` prefix.
    Tool(String),
    /// Part types this consumer does not render (`step-start`, `source-url`, ...).
    Other(String),
}

/// One unit of streamed assistant output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WirePart", into = "WirePart")]
pub struct MessagePart {
    pub id: String,
    pub tool_call_id: Option<String>,
    pub kind: PartKind,
    pub state: Option<LifecycleState>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub text: Option<String>,
    pub error_text: Option<String>,
}

impl MessagePart {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_call_id: None,
            kind: PartKind::Text,
            state: None,
            input: None,
            output: None,
            text: Some(text.into()),
            error_text: None,
        }
    }

    pub fn tool(
        id: impl Into<String>,
        tool_call_id: impl Into<String>,
        identifier: impl Into<String>,
        state: LifecycleState,
    ) -> Self {
        Self {
            id: id.into(),
            tool_call_id: Some(tool_call_id.into()),
            kind: PartKind::Tool(identifier.into()),
            state: Some(state),
            input: None,
            output: None,
            text: None,
            error_text: None,
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error_text: impl Into<String>) -> Self {
        self.error_text = Some(error_text.into());
        self
    }

    pub fn tool_identifier(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Tool(identifier) => Some(identifier),
            _ => None,
        }
    }

    /// Correlation key for tool parts. Falls back to the part id when the
    /// stream omitted `toolCallId`.
    pub fn call_key(&self) -> &str {
        self.tool_call_id.as_deref().unwrap_or(&self.id)
    }
}

/// Stream shape: `{ id, toolCallId, type: "tool-<identifier>" | "text" | "reasoning", state?, input?, output? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_text: Option<String>,
}

impl From<WirePart> for MessagePart {
    fn from(wire: WirePart) -> Self {
        let kind = match wire.part_type.as_str() {
            "text" => PartKind::Text,
            "reasoning" => PartKind::Reasoning,
            t => match t.strip_prefix(TOOL_PART_PREFIX) {
                Some(identifier) if !identifier.is_empty() => PartKind::Tool(identifier.to_string()),
                _ => PartKind::Other(t.to_string()),
            },
        };
        Self {
            id: wire.id,
            tool_call_id: wire.tool_call_id,
            kind,
            state: wire.state,
            input: wire.input,
            output: wire.output,
            text: wire.text,
            error_text: wire.error_text,
        }
    }
}

impl From<MessagePart> for WirePart {
    fn from(part: MessagePart) -> Self {
        let part_type = match part.kind {
            PartKind::Text => "text".to_string(),
            PartKind::Reasoning => "reasoning".to_string(),
            PartKind::Tool(identifier) => format!("{}{}", TOOL_PART_PREFIX, identifier),
            PartKind::Other(t) => t,
        };
        Self {
            id: part.id,
            tool_call_id: part.tool_call_id,
            part_type,
            state: part.state,
            input: part.input,
            output: part.output,
            text: part.text,
            error_text: part.error_text,
        }
    }
}
