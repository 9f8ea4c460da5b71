//! In-memory [`StreamBus`] for tests — consumer-group-aware, unlike a plain
//! broadcast channel, because the worker's semantics (one lease per message
//! per group, ack releases it) can't be exercised correctly on top of
//! broadcast-to-everyone delivery. Pairs with [`RedisStreamBus`] as a
//! deterministic in-process twin of the same trait, with the group/ack
//! bookkeeping consumer-group streams require.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::bus::{BusError, BusResult, StreamBus, StreamMessage};

struct StreamState {
    entries: Vec<StreamMessage>,
    groups: HashMap<String, GroupState>,
}

struct GroupState {
    /// Index into `entries` of the next message this group hasn't delivered.
    next_offset: usize,
    /// Messages delivered but not yet acked, in delivery order.
    pending: VecDeque<String>,
}

#[derive(Default)]
pub struct InMemoryStreamBus {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl InMemoryStreamBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamBus for InMemoryStreamBus {
    async fn ensure_group(&self, stream: &str, group: &str) -> BusResult<()> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams.entry(stream.to_string()).or_insert_with(|| StreamState {
            entries: Vec::new(),
            groups: HashMap::new(),
        });
        state.groups.entry(group.to_string()).or_insert_with(|| GroupState {
            next_offset: 0,
            pending: VecDeque::new(),
        });
        Ok(())
    }

    async fn publish(&self, stream: &str, fields: HashMap<String, String>) -> BusResult<String> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams.entry(stream.to_string()).or_insert_with(|| StreamState {
            entries: Vec::new(),
            groups: HashMap::new(),
        });
        let id = Uuid::new_v4().to_string();
        state.entries.push(StreamMessage { id: id.clone(), fields });
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        count: usize,
        _block_ms: usize,
    ) -> BusResult<Vec<StreamMessage>> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| BusError::Read(format!("unknown stream: {stream}")))?;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| BusError::Read(format!("unknown group: {group}")))?;

        let available = &state.entries[group_state.next_offset..];
        let take = available.len().min(count);
        let messages: Vec<StreamMessage> = available[..take].to_vec();
        group_state.next_offset += take;
        for msg in &messages {
            group_state.pending.push_back(msg.id.clone());
        }
        Ok(messages)
    }

    async fn ack(&self, stream: &str, group: &str, message_id: &str) -> BusResult<()> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| BusError::Ack(format!("unknown stream: {stream}")))?;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| BusError::Ack(format!("unknown group: {group}")))?;
        group_state.pending.retain(|id| id != message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_group_only_returns_unseen_messages_to_the_same_group() {
        let bus = InMemoryStreamBus::new();
        bus.ensure_group("s", "g").await.unwrap();
        bus.publish("s", HashMap::from([("a".to_string(), "1".to_string())]))
            .await
            .unwrap();

        let first = bus.read_group("s", "g", "c1", 10, 0).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = bus.read_group("s", "g", "c1", 10, 0).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn two_groups_each_see_every_message_independently() {
        let bus = InMemoryStreamBus::new();
        bus.ensure_group("s", "g1").await.unwrap();
        bus.ensure_group("s", "g2").await.unwrap();
        bus.publish("s", HashMap::from([("a".to_string(), "1".to_string())]))
            .await
            .unwrap();

        assert_eq!(bus.read_group("s", "g1", "c1", 10, 0).await.unwrap().len(), 1);
        assert_eq!(bus.read_group("s", "g2", "c1", 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ack_is_idempotent_for_unknown_ids() {
        let bus = InMemoryStreamBus::new();
        bus.ensure_group("s", "g").await.unwrap();
        assert!(bus.ack("s", "g", "does-not-exist").await.is_ok());
    }
}
