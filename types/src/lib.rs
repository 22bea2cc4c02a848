//! Core domain types for the Infinite Craft client.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the client.
//!
//! - [`Element`] / [`CraftElement`]: the game entity and the capability interface
//!   the client is generic over
//! - [`DiscoveryRecord`]: the persisted shape of a discovered element
//! - [`PairResponse`]: the JSON payload returned by the pairing endpoint

#![allow(clippy::missing_errors_doc)]

mod discovery;
mod element;
mod wire;

pub use discovery::{DiscoveryRecord, starting_discoveries};
pub use element::{CraftElement, Element};
pub use wire::{NOTHING_RESULT, PairResponse};
