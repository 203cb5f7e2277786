//! Client-side lineage engine for a metadata catalog.
//!
//! The crate builds typed entity graphs (tables, columns, monthly and annual
//! snapshots, change processes, timelines) and reconstructs lineage chains
//! from the catalog's relationship graph. The catalog itself is reached
//! through the [`catalog::Catalog`] trait.

pub mod catalog;
pub mod config;
pub mod error;
pub mod lineage;

pub use error::{LineageError, Result};
