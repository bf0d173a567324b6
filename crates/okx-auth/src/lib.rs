//! Authentication and request signing for the OKX V5 API
//!
//! The same HMAC-SHA256 signature covers both surfaces of the API: the
//! WebSocket login frame (whole-second epoch timestamp) and signed REST
//! requests (millisecond ISO-8601 timestamp). [`sign`] is the shared
//! primitive; [`Credentials`] wraps it with zeroized secret storage.

pub mod credentials;
pub mod error;
pub mod signer;

pub use credentials::Credentials;
pub use error::{AuthError, AuthResult};
pub use signer::{epoch_seconds, iso_millis, sign};
