//! pazar real-time core library.
//! Turns storefront domain events (orders, tickets) into push notifications
//! and threaded chat messages with unread-state bookkeeping.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod notify;
pub mod routes;
pub mod state;
pub mod ws;
