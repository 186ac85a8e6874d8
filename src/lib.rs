//! # SmartWaste Assignment Engine
//!
//! A reactive scheduler for the SmartWaste detection platform. Detections
//! become tasks; the engine continuously matches tasks to available field
//! workers with a genetic optimizer and writes the winning assignment back
//! to the shared store.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/detections ──▶ TaskStore ──▶ TriggerLoop (coalescing)
//!                                               │
//!                                               ▼
//!                  snapshot ─▶ compatibility matrix ─▶ genetic optimizer
//!                                               │
//!                                               ▼
//!                               conditional commit (per task)
//! ```
//!
//! One pipeline run executes at a time; insert signals arriving mid-run
//! collapse into exactly one follow-up run. All store writes are conditional
//! because the store is shared with admin tooling and other services.
//!
//! ## Modules
//! - `api`: HTTP surface (ingestion, task reads, worker directory)
//! - `config`: environment-driven configuration, validated at startup
//! - `engine`: the assignment pipeline and its trigger loop
//! - `store`: SQLite-backed task and worker store

pub mod api;
pub mod config;
pub mod engine;
pub mod store;

pub use config::Config;
