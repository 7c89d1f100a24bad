//! Real-time fanout layer.
//!
//! Delivers a notification payload to every currently-connected session of
//! a recipient, regardless of which server process owns the socket. Each
//! process keeps a local [`ConnectionRegistry`]; processes reach each other
//! through a Redis pub/sub backplane with one logical channel per user.
//! Durability is the notification store's job — this path is fire-and-forget,
//! at-most-once.

pub mod backplane;
pub mod registry;
pub mod wire;

pub use backplane::Fanout;
pub use registry::ConnectionRegistry;
pub use wire::WireMessage;
