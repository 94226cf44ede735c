//! SSE Fan-out & Redis Mirror (base spec §4.10, C10). Every chunk emitted for a run is
//! `XADD`ed to an append-only Redis stream at key `stream:<run_id>` (bounded
//! `maxlen≈1000`, approximate trimming, TTL of ~1 hour set lazily), so a late
//! `/subscribe/{run_id}` caller has somewhere durable to replay from. Companion
//! in-process broadcast channels give a live subscriber immediate delivery without a
//! Redis round trip. Grounded on the teacher's bounded-channel / drop-counter pattern
//! (`serve::run::stream::process_run_stream_event`), generalized from a single
//! per-connection `mpsc` to a per-run `broadcast` channel since a run can have more
//! than one live subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{broadcast, Mutex};

use crate::chunk::{filter_for_egress, Chunk};
use crate::error::GatewayError;
use crate::orchestrator::ChunkSink;

const STREAM_MAXLEN: usize = 1000;
const STREAM_TTL_SECONDS: i64 = 3600;
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

fn stream_key(run_id: &str) -> String {
    format!("stream:{run_id}")
}

/// Maps a replayed `event` field back to the `&'static str` [`Chunk::event_type`] uses,
/// since a `MirroredFrame` read back out of Redis only has an owned `String`.
fn event_type_from_string(s: String) -> &'static str {
    match s.as_str() {
        "content" => "content",
        "reasoning" => "reasoning",
        "hot_code" => "hot_code",
        "status" => "status",
        "error" => "error",
        "function_call" => "function_call",
        _ => "content",
    }
}

/// One frame as recorded for replay: an SSE event type plus its already-serialized JSON
/// payload (base spec §4.10 frame shape, minus the `event:`/`data:` line prefixes which
/// the HTTP layer adds at write time).
#[derive(Clone, Debug)]
pub struct MirroredFrame {
    pub event_type: &'static str,
    pub payload: String,
}

/// Fans a run's chunks out to in-process SSE subscribers and durably mirrors every
/// frame into Redis. Implements [`ChunkSink`], so an `Orchestrator` needs no awareness
/// of either delivery mechanism.
pub struct RedisMirror {
    conn: ConnectionManager,
    channels: Mutex<HashMap<String, broadcast::Sender<MirroredFrame>>>,
    dropped_writes: Arc<AtomicUsize>,
}

impl RedisMirror {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            channels: Mutex::new(HashMap::new()),
            dropped_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Count of chunks that failed to reach Redis (logged, never propagated: a mirror
    /// outage must not abort a run, base spec §8 "mirror failures are logged, not
    /// fatal").
    pub fn dropped_write_count(&self) -> usize {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    /// Subscribes to live, in-process frames for `run_id`. The channel is created on
    /// first subscription and torn down once its sender (held only by this mirror,
    /// dropped the next time the map is pruned) and every receiver are gone; removal is
    /// idempotent, so a subscriber that never connects costs nothing extra.
    pub async fn subscribe(&self, run_id: &str) -> broadcast::Receiver<MirroredFrame> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(run_id.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_QUEUE_CAPACITY).0)
            .subscribe()
    }

    /// Drops the in-process channel for a finished run, so it doesn't accumulate
    /// forever across the process lifetime (the Redis stream itself expires on its own
    /// TTL, independent of this).
    pub async fn forget(&self, run_id: &str) {
        self.channels.lock().await.remove(run_id);
    }

    /// Replays every frame durably mirrored for `run_id`, oldest first (base spec
    /// §4.10/§6: a late `/subscribe` caller must see everything emitted before it
    /// joined). Reads the whole bounded stream rather than tracking a cursor, since
    /// `STREAM_MAXLEN` already caps it to a small, constant-size backlog.
    pub async fn replay(&self, run_id: &str) -> Result<Vec<MirroredFrame>, GatewayError> {
        let mut conn = self.conn.clone();
        let key = stream_key(run_id);
        let reply: redis::streams::StreamRangeReply = conn
            .xrange(&key, "-", "+")
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let mut frames = Vec::with_capacity(reply.ids.len());
        for id in reply.ids {
            let event_type = id
                .map
                .get("event")
                .and_then(|v| redis::FromRedisValue::from_redis_value(v).ok())
                .map(event_type_from_string)
                .unwrap_or("content");
            let payload: String = id
                .map
                .get("data")
                .and_then(|v| redis::FromRedisValue::from_redis_value(v).ok())
                .unwrap_or_default();
            frames.push(MirroredFrame { event_type, payload });
        }
        Ok(frames)
    }

    async fn write_to_redis(&self, run_id: &str, frame: &MirroredFrame) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let key = stream_key(run_id);
        let _: String = conn
            .xadd_maxlen(
                &key,
                redis::streams::StreamMaxlen::Approx(STREAM_MAXLEN),
                "*",
                &[("event", frame.event_type), ("data", frame.payload.as_str())],
            )
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        // TTL is refreshed on every write rather than only the first, which is simpler
        // than tracking "did this key already exist" and has the same effect: the key
        // always expires ~1 hour after the *last* chunk written to it.
        let _: () = conn
            .expire(&key, STREAM_TTL_SECONDS)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(())
    }

    fn publish_in_process(&self, run_id: &str, frame: MirroredFrame) {
        // A run with no live subscriber yet (or one that has already disconnected) is
        // not an error; it's still durably mirrored to Redis above.
        if let Ok(channels) = self.channels.try_lock() {
            if let Some(tx) = channels.get(run_id) {
                let _ = tx.send(frame);
            }
        }
    }
}

#[async_trait]
impl ChunkSink for RedisMirror {
    async fn emit(&self, run_id: &str, chunk: Chunk) {
        if !filter_for_egress(&chunk) {
            return;
        }
        let event_type = chunk.event_type();
        let payload = match chunk.to_protocol_event().to_value() {
            Ok(v) => v.to_string(),
            Err(e) => {
                tracing::error!(run_id, error = %e, "failed to serialize chunk for mirror");
                return;
            }
        };
        let frame = MirroredFrame { event_type, payload };

        if let Err(e) = self.write_to_redis(run_id, &frame).await {
            tracing::warn!(run_id, error = %e.client_message(), "redis mirror write failed");
            self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        }

        self.publish_in_process(run_id, frame);
    }
}
