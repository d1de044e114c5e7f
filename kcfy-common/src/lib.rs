//! # KeyChainify Common Library
//!
//! Shared code for the KeyChainify services including:
//! - Error type and result alias
//! - Bootstrap configuration (TOML file, environment, compiled defaults)
//! - Generation event types and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
