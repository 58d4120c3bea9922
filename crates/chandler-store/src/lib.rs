//! Persistence for chunks, manifests, and schema records.
//!
//! Everything lives in one ordered key-value namespace (see [`keys`]) behind
//! [`KvStore`], which is backed by Fjall on disk or by a `BTreeMap` in
//! memory. Writes go through a [`WriteTx`] and become visible atomically on
//! commit.

mod chunks;
mod error;
pub mod keys;
mod kv;
mod manifests;
mod schema;

pub use error::StoreError;
pub use kv::{KvStore, PrefixStats, WriteTx};
pub use schema::SCHEMA_VERSION;
