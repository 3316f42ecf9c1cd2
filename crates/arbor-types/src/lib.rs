//! Foundation types for Arbor.
//!
//! Arbor keeps a mutable directory tree on top of an immutable,
//! content-addressed object store. This crate holds the identity type every
//! other crate passes around.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content identity of a stored node (BLAKE3 digest)
//! - [`TypeError`] -- Parse failures for identities

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
