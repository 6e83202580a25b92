//! Append-only JSONL activity log written from a dedicated thread.

pub mod activity;
pub mod jsonl;
