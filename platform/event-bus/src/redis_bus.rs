//! Redis Streams implementation of [`StreamBus`] — production consumer-group
//! transport, built on raw `redis` crate calls (XADD/XREADGROUP/XACK/XGROUP
//! CREATE) over the async `tokio-comp` connection.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use crate::bus::{BusError, BusResult, StreamBus, StreamMessage};

pub struct RedisStreamBus {
    client: redis::Client,
}

impl RedisStreamBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> BusResult<Self> {
        let client = redis::Client::open(url).map_err(|e| BusError::Connection(e.to_string()))?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> BusResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StreamBus for RedisStreamBus {
    async fn ensure_group(&self, stream: &str, group: &str) -> BusResult<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "0").await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(BusError::GroupCreate(e.to_string())),
        }
    }

    async fn publish(&self, stream: &str, fields: HashMap<String, String>) -> BusResult<String> {
        let mut conn = self.connection().await?;
        let items: Vec<(String, String)> = fields.into_iter().collect();
        let id: String = conn
            .xadd(stream, "*", &items)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> BusResult<Vec<StreamMessage>> {
        let mut conn = self.connection().await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);
        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .map_err(|e| BusError::Read(e.to_string()))?;

        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let mut fields = HashMap::with_capacity(entry.map.len());
                for (key, value) in entry.map {
                    if let redis::Value::BulkString(bytes) = value {
                        fields.insert(key, String::from_utf8_lossy(&bytes).to_string());
                    }
                }
                messages.push(StreamMessage {
                    id: entry.id,
                    fields,
                });
            }
        }
        Ok(messages)
    }

    async fn ack(&self, stream: &str, group: &str, message_id: &str) -> BusResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .xack(stream, group, &[message_id])
            .await
            .map_err(|e| BusError::Ack(e.to_string()))?;
        Ok(())
    }
}
