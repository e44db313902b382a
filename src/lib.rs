//! Etuhinta - backend core for a local deals marketplace
//!
//! Records how users engage with offers (views, clicks, typed conversions),
//! rolls the interactions up into per-offer and per-business daily
//! aggregates, and serves an AI chat assistant that finds offers through
//! tool calling.
//!
//! # Architecture
//! - `analytics`: event store, dedup, daily rollups, batch ingest, reports
//! - `services`: offer search, chat orchestrator, LLM provider, user quota
//! - `api`: HTTP handlers, auth extractors, rate limiting
//! - `storage`: SeaORM connection, migrations and retry
//! - `config`: static configuration (TOML + env)
//! - `runtime`: startup wiring, server mode, graceful shutdown
//! - `system`: logging

pub mod analytics;
pub mod api;
pub mod config;
pub mod errors;
pub mod metrics_core;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
