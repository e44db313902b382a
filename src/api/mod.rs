//! HTTP API
//!
//! - `jwt`: bearer token validation
//! - `middleware`: auth extractors and the chat rate limiter
//! - `services`: route handlers

pub mod jwt;
pub mod middleware;
pub mod services;
