//! Hash computation and object identity for the gitr git implementation.
//!
//! This crate provides the core `ObjectId` type, hash computation, and hex
//! encoding/decoding shared by every layer that needs content-addressed
//! identities — most directly, the streaming packfile parser in `git-pack`.

mod error;
pub mod hex;
mod algorithm;
mod oid;
pub mod hasher;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use oid::ObjectId;
