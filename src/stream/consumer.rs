//! Turns the streamed part list of a message into a render list.
//!
//! State is tracked per `toolCallId`: a call's lifecycle only moves forward,
//! and the first terminal render computed for it is kept for good. Each
//! call occupies one slot in the render list, at the position of its first
//! part.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{
    blockchain::{
        intent::{BuildContext, IntentBuilder},
        models::PreparedIntent,
    },
    error::ValidationError,
    registry::ToolRegistry,
    stream::models::{LifecycleState, MessagePart, PartKind},
};

/// Result of turning an action tool's output into an intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ActionOutcome {
    Ready(PreparedIntent),
    Invalid(ValidationError),
}

impl From<Result<PreparedIntent, ValidationError>> for ActionOutcome {
    fn from(result: Result<PreparedIntent, ValidationError>) -> Self {
        match result {
            Ok(prepared) => ActionOutcome::Ready(prepared),
            Err(err) => ActionOutcome::Invalid(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RenderItem {
    #[serde(rename_all = "camelCase")]
    Text { part_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    Reasoning { part_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    ToolLoading {
        tool_call_id: String,
        tool_identifier: String,
        label: String,
    },
    /// Read-only output, handed to the renderer exactly as the tool produced it.
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        tool_identifier: String,
        renderer_id: String,
        payload: Value,
        fallback: bool,
    },
    #[serde(rename_all = "camelCase")]
    ActionCard {
        tool_call_id: String,
        tool_identifier: String,
        renderer_id: String,
        outcome: ActionOutcome,
    },
    #[serde(rename_all = "camelCase")]
    ToolError {
        tool_call_id: String,
        tool_identifier: String,
        error_text: String,
    },
}

impl RenderItem {
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            RenderItem::ToolLoading { tool_call_id, .. }
            | RenderItem::ToolResult { tool_call_id, .. }
            | RenderItem::ActionCard { tool_call_id, .. }
            | RenderItem::ToolError { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderItem::ToolResult { .. } | RenderItem::ActionCard { .. } | RenderItem::ToolError { .. }
        )
    }
}

#[derive(Debug)]
struct CallSlot {
    state: LifecycleState,
    render: RenderItem,
}

#[derive(Debug, Default)]
struct MessageView {
    calls: HashMap<String, CallSlot>,
    items: Vec<RenderItem>,
    fingerprint: Option<[u8; 32]>,
}

/// Consumes agent stream updates, keyed by message id.
#[derive(Debug)]
pub struct StreamConsumer {
    registry: Arc<ToolRegistry>,
    builder: IntentBuilder,
    context: BuildContext,
    memoize: bool,
    messages: HashMap<String, MessageView>,
    recomputations: u64,
}

impl StreamConsumer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            builder: IntentBuilder::new(registry.clone()),
            registry,
            context: BuildContext::default(),
            memoize: false,
            messages: HashMap::new(),
            recomputations: 0,
        }
    }

    /// Skip recomputation when the part list hashes the same as last time.
    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    /// Facts passed to the intent builder for action tools.
    pub fn with_build_context(mut self, context: BuildContext) -> Self {
        self.context = context;
        self
    }

    /// Number of render lists computed so far.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Applies the current part list of a message. The list may have grown
    /// since the previous call or may repeat earlier deliveries.
    pub fn update(&mut self, message_id: &str, parts: &[MessagePart]) -> &[RenderItem] {
        let context = self.context.clone();
        self.update_with(message_id, parts, &context)
    }

    /// Like [`update`](Self::update), with a build context for this delivery,
    /// e.g. one carrying the connected address as deployer.
    pub fn update_with(
        &mut self,
        message_id: &str,
        parts: &[MessagePart],
        context: &BuildContext,
    ) -> &[RenderItem] {
        let fingerprint = if self.memoize { fingerprint(parts) } else { None };
        let view = self.messages.entry(message_id.to_string()).or_default();

        if fingerprint.is_some() && view.fingerprint == fingerprint {
            return &view.items;
        }

        for part in parts {
            let Some(identifier) = part.tool_identifier() else {
                continue;
            };
            // A tool part without a state has only just started streaming.
            let state = part.state.unwrap_or(LifecycleState::InputStreaming);
            let key = part.call_key();

            match view.calls.get_mut(key) {
                Some(slot) if slot.state.is_terminal() || state.rank() <= slot.state.rank() => {}
                Some(slot) => {
                    slot.state = state;
                    if state.is_terminal() {
                        slot.render = render_terminal(&self.registry, &self.builder, context, part, identifier);
                    }
                }
                None => {
                    let render = if state.is_terminal() {
                        render_terminal(&self.registry, &self.builder, context, part, identifier)
                    } else {
                        RenderItem::ToolLoading {
                            tool_call_id: key.to_string(),
                            tool_identifier: identifier.to_string(),
                            label: self.registry.resolve(identifier).loading_label.to_string(),
                        }
                    };
                    view.calls.insert(key.to_string(), CallSlot { state, render });
                }
            }
        }

        let mut placed = HashSet::new();
        let items: Vec<RenderItem> = parts
            .iter()
            .filter_map(|part| match &part.kind {
                PartKind::Text => Some(RenderItem::Text {
                    part_id: part.id.clone(),
                    text: part.text.clone().unwrap_or_default(),
                }),
                PartKind::Reasoning => Some(RenderItem::Reasoning {
                    part_id: part.id.clone(),
                    text: part.text.clone().unwrap_or_default(),
                }),
                PartKind::Tool(_) => {
                    let key = part.call_key();
                    if !placed.insert(key) {
                        return None;
                    }
                    view.calls.get(key).map(|slot| slot.render.clone())
                }
                PartKind::Other(_) => None,
            })
            .collect();
        view.items = items;
        view.fingerprint = fingerprint;

        self.recomputations += 1;
        debug!(
            message_id,
            parts = parts.len(),
            items = view.items.len(),
            "recomputed render list"
        );
        &view.items
    }

    /// Discards everything known about a message and rebuilds it from `parts`.
    /// Used when a message is edited or regenerated.
    pub fn replace(&mut self, message_id: &str, parts: &[MessagePart]) -> &[RenderItem] {
        self.messages.remove(message_id);
        self.update(message_id, parts)
    }

    pub fn replace_with(
        &mut self,
        message_id: &str,
        parts: &[MessagePart],
        context: &BuildContext,
    ) -> &[RenderItem] {
        self.messages.remove(message_id);
        self.update_with(message_id, parts, context)
    }

    /// Forgets a message once the client no longer displays it.
    pub fn remove(&mut self, message_id: &str) -> bool {
        self.messages.remove(message_id).is_some()
    }

    pub fn render_list(&self, message_id: &str) -> Option<&[RenderItem]> {
        self.messages.get(message_id).map(|view| view.items.as_slice())
    }

    /// Number of messages with render state.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn render_terminal(
    registry: &ToolRegistry,
    builder: &IntentBuilder,
    context: &BuildContext,
    part: &MessagePart,
    identifier: &str,
) -> RenderItem {
    let tool_call_id = part.call_key().to_string();
    let tool_identifier = identifier.to_string();

    if part.state == Some(LifecycleState::OutputError) {
        return RenderItem::ToolError {
            tool_call_id,
            tool_identifier,
            error_text: part
                .error_text
                .clone()
                .unwrap_or_else(|| "Tool call failed".to_string()),
        };
    }

    let descriptor = registry.resolve(identifier);
    let payload = part.output.clone().unwrap_or(Value::Null);

    if descriptor.produces_transaction {
        let outcome = ActionOutcome::from(builder.build(identifier, &payload, context));
        if let ActionOutcome::Invalid(err) = &outcome {
            warn!(tool_call_id = %tool_call_id, %err, "tool output is not a valid transaction");
        }
        return RenderItem::ActionCard {
            tool_call_id,
            tool_identifier,
            renderer_id: descriptor.renderer_id.to_string(),
            outcome,
        };
    }

    RenderItem::ToolResult {
        tool_call_id,
        tool_identifier,
        renderer_id: descriptor.renderer_id.to_string(),
        payload,
        fallback: descriptor.is_fallback(),
    }
}

fn fingerprint(parts: &[MessagePart]) -> Option<[u8; 32]> {
    let bytes = serde_json::to_vec(parts).ok()?;
    Some(Sha256::digest(&bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use LifecycleState::*;

    fn consumer() -> StreamConsumer {
        StreamConsumer::new(Arc::new(ToolRegistry::builtin()))
    }

    fn terminal_count(items: &[RenderItem], call: &str) -> usize {
        items
            .iter()
            .filter(|i| i.tool_call_id() == Some(call) && i.is_terminal())
            .count()
    }

    #[test]
    fn alex_pool_list_gets_payload_unmodified() {
        let payload = json!({ "pools": [{ "id": 1, "tokenX": "STX", "tokenY": "ALEX" }], "count": 1 });
        let parts = vec![
            MessagePart::tool("p1", "call_1", "alexGetAllPools", OutputAvailable).with_output(payload.clone()),
        ];
        let mut consumer = consumer();
        let items = consumer.update("m1", &parts);
        assert_eq!(
            items,
            &[RenderItem::ToolResult {
                tool_call_id: "call_1".into(),
                tool_identifier: "alexGetAllPools".into(),
                renderer_id: "alex-pool-list".into(),
                payload,
                fallback: false,
            }]
        );
    }

    #[test]
    fn loading_label_is_replaced_by_final_render() {
        let mut consumer = consumer();
        let mut parts = vec![
            MessagePart::text("t1", "Checking pools"),
            MessagePart::tool("p1", "call_1", "alexGetAllPools", InputAvailable),
        ];
        let items = consumer.update("m1", &parts).to_vec();
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], RenderItem::ToolLoading { tool_call_id, .. } if tool_call_id == "call_1"));

        parts.push(MessagePart::tool("p1b", "call_1", "alexGetAllPools", OutputAvailable).with_output(json!([])));
        let items = consumer.update("m1", &parts);
        assert_eq!(items.len(), 2);
        assert_eq!(terminal_count(items, "call_1"), 1);
        assert!(!items.iter().any(|i| matches!(i, RenderItem::ToolLoading { .. })));
    }

    #[test]
    fn call_advances_through_each_lifecycle_state() {
        let mut consumer = consumer();
        let mut part = MessagePart::tool("p1", "call_1", "getStxBalance", InputStreaming);

        let items = consumer.update("m1", &[part.clone()]).to_vec();
        assert!(matches!(&items[0], RenderItem::ToolLoading { tool_call_id, .. } if tool_call_id == "call_1"));

        part.state = Some(InputAvailable);
        let items = consumer.update("m1", &[part.clone()]).to_vec();
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], RenderItem::ToolLoading { .. }));

        let done = MessagePart::tool("p1", "call_1", "getStxBalance", OutputAvailable).with_output(json!({ "stx": "12" }));
        let items = consumer.update("m1", &[done]);
        assert_eq!(items.len(), 1);
        assert_eq!(terminal_count(items, "call_1"), 1);
        assert!(matches!(&items[0], RenderItem::ToolResult { payload, .. } if payload == &json!({ "stx": "12" })));
    }

    #[test]
    fn tool_part_without_state_shows_its_loading_label() {
        let mut consumer = consumer();
        let mut pending = MessagePart::tool("p1", "c1", "alexGetAllPools", InputStreaming);
        pending.state = None;

        let items = consumer.update("m1", &[MessagePart::text("t1", "Looking"), pending]);
        assert_eq!(items.len(), 2);
        assert!(matches!(
            &items[1],
            RenderItem::ToolLoading { tool_call_id, tool_identifier, .. } if tool_call_id == "c1" && tool_identifier == "alexGetAllPools"
        ));
    }

    #[test]
    fn deploy_card_carries_contract_id_from_context() {
        let mut consumer = consumer();
        let parts = vec![MessagePart::tool("p1", "call_1", "deployContract", OutputAvailable).with_output(json!({
            "contractName": "my-token",
            "code": "(define-fungible-token my-token)",
            "clarityVersion": 2
        }))];
        let context = BuildContext::new().with_deployer("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG");
        let items = consumer.update_with("m1", &parts, &context);
        match &items[0] {
            RenderItem::ActionCard { outcome: ActionOutcome::Ready(prepared), .. } => {
                assert_eq!(
                    prepared.contract_id.as_deref(),
                    Some("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG.my-token")
                );
            }
            other => panic!("expected ready action card, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_and_stale_events_never_regress() {
        let mut consumer = consumer();
        let done = MessagePart::tool("p1", "call_1", "alexGetAllPools", OutputAvailable).with_output(json!({ "n": 1 }));
        consumer.update("m1", &[done.clone()]);

        // stale input-available and a second terminal event for the same call
        let parts = vec![
            MessagePart::tool("p0", "call_1", "alexGetAllPools", InputAvailable),
            done.clone(),
            MessagePart::tool("p2", "call_1", "alexGetAllPools", OutputError).with_error("late failure"),
        ];
        let items = consumer.update("m1", &parts);
        assert_eq!(items.len(), 1);
        assert_eq!(terminal_count(items, "call_1"), 1);
        assert!(matches!(&items[0], RenderItem::ToolResult { payload, .. } if payload == &json!({ "n": 1 })));
    }

    #[test]
    fn output_error_is_isolated_to_its_call() {
        let mut consumer = consumer();
        let parts = vec![
            MessagePart::text("t1", "Two lookups"),
            MessagePart::tool("p1", "call_1", "getStxBalance", OutputError).with_error("rate limited"),
            MessagePart::tool("p2", "call_2", "alexGetAllPools", OutputAvailable).with_output(json!([])),
        ];
        let items = consumer.update("m1", &parts);
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[1], RenderItem::ToolError { error_text, .. } if error_text == "rate limited"));
        assert!(matches!(&items[2], RenderItem::ToolResult { .. }));
    }

    #[test]
    fn unknown_tool_renders_raw_payload() {
        let mut consumer = consumer();
        let payload = json!({ "anything": true });
        let parts = vec![MessagePart::tool("p1", "call_1", "unknownThing123", OutputAvailable).with_output(payload.clone())];
        let items = consumer.update("m1", &parts);
        assert!(matches!(
            &items[0],
            RenderItem::ToolResult { renderer_id, fallback: true, payload: p, .. } if renderer_id == "raw-json" && p == &payload
        ));
    }

    #[test]
    fn action_tool_builds_an_intent_card() {
        let mut consumer = consumer();
        let parts = vec![MessagePart::tool("p1", "call_1", "stxTransfer", OutputAvailable).with_output(json!({
            "recipient": "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG",
            "amount": "1000000"
        }))];
        let items = consumer.update("m1", &parts);
        match &items[0] {
            RenderItem::ActionCard { outcome: ActionOutcome::Ready(prepared), .. } => {
                assert_eq!(prepared.tool_identifier, "stxTransfer");
            }
            other => panic!("expected ready action card, got {:?}", other),
        }
    }

    #[test]
    fn malformed_action_output_names_the_field() {
        let mut consumer = consumer();
        let parts = vec![
            MessagePart::tool("p1", "call_1", "stxTransfer", OutputAvailable).with_output(json!({ "amount": "5" })),
        ];
        let items = consumer.update("m1", &parts);
        match &items[0] {
            RenderItem::ActionCard { outcome: ActionOutcome::Invalid(err), .. } => {
                assert_eq!(err.field, "recipient");
            }
            other => panic!("expected invalid action card, got {:?}", other),
        }
    }

    #[test]
    fn replace_discards_previous_state() {
        let mut consumer = consumer();
        consumer.update(
            "m1",
            &[MessagePart::tool("p1", "call_1", "alexGetAllPools", OutputAvailable).with_output(json!(1))],
        );
        let items = consumer.replace(
            "m1",
            &[MessagePart::tool("p1", "call_1", "alexGetAllPools", InputAvailable)],
        );
        assert!(matches!(&items[0], RenderItem::ToolLoading { .. }));
        assert!(consumer.remove("m1"));
        assert!(consumer.render_list("m1").is_none());
        assert!(consumer.is_empty());
        assert!(!consumer.remove("m1"));
    }

    #[test]
    fn memoization_skips_unchanged_part_lists() {
        let parts = vec![MessagePart::text("t1", "hello")];

        let mut always = consumer();
        always.update("m1", &parts);
        always.update("m1", &parts);
        assert_eq!(always.recomputations(), 2);

        let mut memoized = consumer().with_memoization(true);
        memoized.update("m1", &parts);
        memoized.update("m1", &parts);
        assert_eq!(memoized.recomputations(), 1);

        let grown = vec![MessagePart::text("t1", "hello"), MessagePart::text("t2", "again")];
        assert_eq!(memoized.update("m1", &grown).len(), 2);
        assert_eq!(memoized.recomputations(), 2);
    }
}
