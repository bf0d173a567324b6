//! Signed REST request primitive for the OKX V5 API
//!
//! Individual endpoint wrappers are parameter marshaling over one
//! shared primitive: [`OkxRestClient::get`] / [`OkxRestClient::post`]
//! sign the request with the millisecond ISO-8601 timestamp variant and
//! unwrap the `{code, msg, data}` response envelope. Consumers build
//! their endpoint methods on top of these.

pub mod client;
pub mod error;

pub use client::{ApiResponse, ClientConfig, OkxRestClient};
pub use error::{RestError, RestResult};
