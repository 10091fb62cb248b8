//! Core records and identifiers for the Atmosphere command-line client.
//!
//! This crate provides the data model shared by every other crate:
//!
//! - **Identifiers**: [`VolumeId`] with the casing convention the control API expects
//! - **Records**: [`Volume`], [`Instance`], [`Image`] and [`App`] as decoded from listings
//! - **Error types**: [`CoreError`] for malformed identifiers
//!
//! Records are immutable snapshots. The client never edits one in place; it
//! re-fetches the listing and replaces the snapshot wholesale.
//!
//! # Example
//!
//! ```
//! use atmocl_core::VolumeId;
//!
//! let id = VolumeId::parse("vol-0000abcd").unwrap();
//! assert_eq!(id.normalized().as_str(), "vol-0000ABCD");
//! assert!(id.matches(&id.normalized()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod records;

pub use error::{CoreError, Result};
pub use ids::VolumeId;
pub use records::{App, Image, Instance, Volume};
