//! # Archivist Common Library
//!
//! Shared code for the archivist job service crates:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Job event types and the broadcast EventBus
//! - Message catalog used for job log lines and notices

pub mod config;
pub mod error;
pub mod events;
pub mod i18n;

pub use error::{Error, Result};
pub use i18n::Catalog;
