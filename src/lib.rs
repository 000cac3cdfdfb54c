//! Offline donation queue for the fire-brigade calendar campaign.
//!
//! Donations recorded while the app is offline are held in a durable local
//! queue and replayed to the remote store, in insertion order, once
//! connectivity returns.

pub mod config;
pub mod model;
pub mod queue;
pub mod remote;
pub mod store;
