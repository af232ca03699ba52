#![doc = "textsync-core: reconciliation logic library for textsync."]

//! This crate holds everything needed to converge a declared set of text
//! documents (and the single collection that groups them) onto a remote
//! document store, and to remember what the last successful pass produced.
//! Transport is not included here: the remote store is reached through the
//! [`contract::RemoteClient`] trait, implemented by the CLI crate and by mocks.
//!
//! # Usage
//! Load a [`config::DataConfig`], build a [`reconcile::Reconciler`] over a
//! client, run `ensure`/`update`/`destroy`, then persist the result with
//! [`status::StatusLedger::save`].

pub mod config;
pub mod content;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod rst;
pub mod status;

pub use error::{ConfigError, LedgerError, SyncError};
