//! External service clients
//!
//! This module provides:
//! - The `MetadataApi` trait and its OpenSea implementation
//! - The `SupplySource` trait and its Ethereum JSON-RPC implementation
//!
//! All network specifics live in dedicated client modules. The rest of
//! the application interacts exclusively through the traits, so tests
//! can substitute scripted fakes.

pub mod metadata;
pub mod opensea;
pub mod supply;
