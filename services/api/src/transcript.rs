//! Transcript Store
//!
//! Ordered, in-memory collection of conversation turns keyed by a stable
//! item id. Streaming events mutate items in place; terminal status events
//! are idempotent. The store holds the invariant that at most one item is
//! "the most recent assistant item in non-Done status" — the target of
//! barge-in cancellation.

use crate::models::{ItemKind, ItemStatus, Role, TranscriptItem, now_ms};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TranscriptStore {
    items: Vec<TranscriptItem>,
    index: HashMap<String, usize>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&TranscriptItem> {
        self.index.get(item_id).map(|&i| &self.items[i])
    }

    /// Adds a message item if no item with this id exists yet. Returns the
    /// stored item; a pre-existing item is returned untouched, which keeps
    /// duplicate `conversation.item.created` events idempotent.
    pub fn add_message(
        &mut self,
        item_id: &str,
        role: Role,
        text: &str,
        status: ItemStatus,
        hidden: bool,
    ) -> &TranscriptItem {
        if let Some(&i) = self.index.get(item_id) {
            debug!(item_id, "transcript item already exists, skipping add");
            return &self.items[i];
        }
        self.push(TranscriptItem {
            item_id: item_id.to_string(),
            role,
            kind: ItemKind::Message,
            text: text.to_string(),
            status,
            hidden,
            data: None,
            created_at_ms: now_ms(),
        })
    }

    /// Appends an audit breadcrumb (always a Done system item).
    pub fn add_breadcrumb(
        &mut self,
        title: &str,
        data: Option<serde_json::Value>,
    ) -> &TranscriptItem {
        let item_id = format!("breadcrumb-{}", Uuid::new_v4().simple());
        self.push(TranscriptItem {
            item_id,
            role: Role::System,
            kind: ItemKind::Breadcrumb,
            text: title.to_string(),
            status: ItemStatus::Done,
            hidden: false,
            data,
            created_at_ms: now_ms(),
        })
    }

    /// Records a model tool invocation (always a Done system item). The
    /// call id doubles as the item id; arguments travel in `data`.
    pub fn add_function_call(
        &mut self,
        call_id: &str,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> &TranscriptItem {
        if let Some(&i) = self.index.get(call_id) {
            debug!(call_id, "function call already recorded, skipping add");
            return &self.items[i];
        }
        self.push(TranscriptItem {
            item_id: call_id.to_string(),
            role: Role::System,
            kind: ItemKind::FunctionCall,
            text: name.to_string(),
            status: ItemStatus::Done,
            hidden: false,
            data: arguments,
            created_at_ms: now_ms(),
        })
    }

    /// Appends a streaming delta to the item, creating it in `InProgress`
    /// status if no item with this id exists yet. Deltas arriving after the
    /// item is Done are dropped.
    pub fn append_delta(
        &mut self,
        item_id: &str,
        role: Role,
        delta: &str,
    ) -> Option<&TranscriptItem> {
        if !self.index.contains_key(item_id) {
            self.push(TranscriptItem {
                item_id: item_id.to_string(),
                role,
                kind: ItemKind::Message,
                text: String::new(),
                status: ItemStatus::InProgress,
                hidden: false,
                data: None,
                created_at_ms: now_ms(),
            });
        }
        let i = *self.index.get(item_id)?;
        let item = &mut self.items[i];
        if item.status == ItemStatus::Done {
            debug!(item_id, "ignoring delta for completed item");
            return None;
        }
        item.text.push_str(delta);
        Some(&self.items[i])
    }

    /// Replaces the item's text (final transcription). Returns the updated
    /// item, or `None` if the id is unknown.
    pub fn set_text(&mut self, item_id: &str, text: &str) -> Option<&TranscriptItem> {
        let i = *self.index.get(item_id)?;
        self.items[i].text = text.to_string();
        Some(&self.items[i])
    }

    /// Transitions the item to Done. Re-applying Done to an already-Done
    /// item is a no-op and returns `None`.
    pub fn mark_done(&mut self, item_id: &str) -> Option<&TranscriptItem> {
        let i = *self.index.get(item_id)?;
        if self.items[i].status == ItemStatus::Done {
            return None;
        }
        self.items[i].status = ItemStatus::Done;
        Some(&self.items[i])
    }

    /// The most recent assistant message, regardless of status.
    pub fn latest_assistant(&self) -> Option<&TranscriptItem> {
        self.items
            .iter()
            .rev()
            .find(|item| item.role == Role::Assistant && item.kind == ItemKind::Message)
    }

    fn push(&mut self, item: TranscriptItem) -> &TranscriptItem {
        let i = self.items.len();
        self.index.insert(item.item_id.clone(), i);
        self.items.push(item);
        &self.items[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_concatenate_in_order() {
        let mut store = TranscriptStore::new();
        for delta in ["Hel", "lo ", "wor", "ld"] {
            store.append_delta("item_1", Role::Assistant, delta);
        }
        assert_eq!(store.get("item_1").unwrap().text, "Hello world");
        assert_eq!(store.get("item_1").unwrap().status, ItemStatus::InProgress);
    }

    #[test]
    fn first_delta_creates_in_progress_item() {
        let mut store = TranscriptStore::new();
        let item = store.append_delta("item_1", Role::Assistant, "hi").unwrap();
        assert_eq!(item.status, ItemStatus::InProgress);
        assert_eq!(item.role, Role::Assistant);
    }

    #[test]
    fn mark_done_is_idempotent() {
        let mut store = TranscriptStore::new();
        store.append_delta("item_1", Role::Assistant, "hello");
        assert!(store.mark_done("item_1").is_some());
        assert!(store.mark_done("item_1").is_none());
        assert_eq!(store.get("item_1").unwrap().text, "hello");
        assert_eq!(store.get("item_1").unwrap().status, ItemStatus::Done);
    }

    #[test]
    fn deltas_after_done_are_dropped() {
        let mut store = TranscriptStore::new();
        store.append_delta("item_1", Role::Assistant, "final");
        store.mark_done("item_1");
        assert!(store.append_delta("item_1", Role::Assistant, " more").is_none());
        assert_eq!(store.get("item_1").unwrap().text, "final");
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut store = TranscriptStore::new();
        store.add_message("m1", Role::User, "first", ItemStatus::Done, false);
        store.add_message("m1", Role::User, "second", ItemStatus::Done, false);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.get("m1").unwrap().text, "first");
    }

    #[test]
    fn latest_assistant_skips_user_and_breadcrumbs() {
        let mut store = TranscriptStore::new();
        store.append_delta("a1", Role::Assistant, "one");
        store.add_message("u1", Role::User, "question", ItemStatus::Done, false);
        store.add_breadcrumb("Agent: closing", None);
        assert_eq!(store.latest_assistant().unwrap().item_id, "a1");
    }

    #[test]
    fn function_calls_are_recorded_as_done_items() {
        let mut store = TranscriptStore::new();
        let args = serde_json::json!({"role": "backend"});
        store.add_function_call("call_1", "lookup_role_description", Some(args.clone()));
        let item = store.get("call_1").unwrap();
        assert_eq!(item.kind, ItemKind::FunctionCall);
        assert_eq!(item.status, ItemStatus::Done);
        assert_eq!(item.text, "lookup_role_description");
        assert_eq!(item.data, Some(args));
        // A duplicate call id does not create a second item.
        store.add_function_call("call_1", "lookup_role_description", None);
        assert_eq!(store.items().len(), 1);
        // Tool calls never become a barge-in target.
        assert!(store.latest_assistant().is_none());
    }

    #[test]
    fn latest_assistant_is_none_on_empty_store() {
        let store = TranscriptStore::new();
        assert!(store.latest_assistant().is_none());
    }

    #[test]
    fn items_are_never_removed() {
        let mut store = TranscriptStore::new();
        store.add_message("m1", Role::User, "hi", ItemStatus::Done, true);
        store.mark_done("m1");
        assert_eq!(store.items().len(), 1);
        assert!(store.items()[0].hidden);
    }
}
