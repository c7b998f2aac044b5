//! Streaming HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event stream endpoint.
//! The fan-out machinery (Hub, Session, Notifier) lives in the `sse` crate so
//! it stays independent of routing.

pub mod handler;
