//! # accrue-core
//! Foundation types, policy parameters and pure reward computations for Accrue.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! `tracing` events. Concurrency and collaborator I/O live in `accrue-engine`.

pub mod constants;
pub mod effects;
pub mod error;
pub mod fingerprint;
pub mod params;
pub mod primitives;
pub mod progression;
pub mod traits;
pub mod trust;
pub mod types;
