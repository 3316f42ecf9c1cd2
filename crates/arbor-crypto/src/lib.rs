//! Hashing primitives for Arbor.
//!
//! Provides domain-separated BLAKE3 hashing and the [`IdentityBuilder`] that
//! turns an encoded node into its [`ObjectId`](arbor_types::ObjectId).
//!
//! All hashing wraps the `blake3` crate.

pub mod hasher;
pub mod identity;

pub use hasher::ContentHasher;
pub use identity::IdentityBuilder;
