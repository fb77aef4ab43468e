//! services/api/src/lib.rs
//!
//! The live classroom API service: REST routes for lectures and questions, a
//! WebSocket endpoint for lecture rooms, and the storage adapters behind them.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
