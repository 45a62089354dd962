//! Gateway payload builders

use serde_json::{json, Value};

pub const OP_DISPATCH: u64 = 0;
pub const OP_HEARTBEAT: u64 = 1;
pub const OP_IDENTIFY: u64 = 2;
pub const OP_RESUME: u64 = 6;

pub fn hello(heartbeat_interval: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}})
}

pub fn heartbeat_ack() -> Value {
    json!({"op": 11, "d": null})
}

pub fn dispatch(name: &str, seq: u64, data: Value) -> Value {
    json!({"op": 0, "s": seq, "t": name, "d": data})
}

pub fn ready(seq: u64, session_id: &str, shard: Value, resume_url: &str) -> Value {
    dispatch(
        "READY",
        seq,
        json!({
            "v": 10,
            "session_id": session_id,
            "resume_gateway_url": resume_url,
            "shard": shard,
            "user": {"id": "1", "username": "bot"},
            "guilds": []
        }),
    )
}

pub fn message_create(seq: u64, channel_id: &str, content: &str) -> Value {
    dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({"id": seq.to_string(), "channel_id": channel_id, "content": content}),
    )
}

pub fn gateway_bot(url: &str, shards: u32, max_concurrency: u32) -> Value {
    json!({
        "url": url,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 1000,
            "reset_after": 86_400_000,
            "max_concurrency": max_concurrency
        }
    })
}
