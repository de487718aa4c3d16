//! netchat - a multi-room, line-oriented TCP chat server
//!
//! This crate provides the core functionality for netchat, including:
//! - Session registry (stable handles, tombstoning)
//! - Group directory (membership, the 10-seat cap, admission)
//! - Message routing (live fan-out vs. per-group pending buffers)
//! - Per-group append-only transcripts with replay on first join
//!
//! # Architecture
//!
//! One task per accepted TCP connection reads newline-delimited commands
//! and chat text; all shared state (sessions, groups, pending buffers)
//! lives behind a single coarse lock, and every delivery goes through a
//! per-client writer task.

pub mod banner;
pub mod config;
pub mod group;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod storage;
pub mod style;
pub mod textpipe;
