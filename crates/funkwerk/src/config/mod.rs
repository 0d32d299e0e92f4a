//! Bus configuration.
//!
//! Parsed from `funkwerk.toml` with `FUNKWERK_*` environment overrides.
//! The resolved [`BusTopology`] is the explicit table of broker and queue
//! endpoints handed to the ISC layer at construction — queue names are a
//! wire contract, their endpoints are deployment configuration.

mod loading;
mod types;

#[cfg(test)]
mod tests;

pub use types::{BrokerEndpoints, BusTopology, FunkwerkConfig, QueueEndpoints};
