//! Shared types for the OKX V5 streaming and REST APIs
//!
//! This crate provides the core type definitions used across the workspace.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`Channel`], [`CandleInterval`], [`InstType`], [`Side`] - subscription enums
//! - [`WsMessage`] - classified inbound WebSocket frame
//! - [`SubscribeArg`], [`LoginArgs`], [`OpRequest`] - outbound control frames
//! - [`Ticker`], [`Trade`], [`BookData`], [`Order`], [`Position`] - channel payloads
//! - [`OkxError`] - error types

pub mod data;
pub mod enums;
pub mod error;
pub mod messages;

// Re-export commonly used types
pub use data::*;
pub use enums::*;
pub use error::*;
pub use messages::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
