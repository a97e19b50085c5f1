//! # Context Library Core
//!
//! Shared, I/O-free logic for Context Library: the lexical document index,
//! the error taxonomy, store / vector-store / embedding / completion traits,
//! in-memory backends, and the context-assembly algorithm.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Networked and filesystem backends live in the `context-library` app crate
//! and plug in through the traits defined here.

pub mod completion;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod history;
pub mod store;
pub mod vector;

pub use error::{Error, Result, Stage};
