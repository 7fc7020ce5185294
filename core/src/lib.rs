//! Trust evaluation engine for business listing verification.
//!
//! Everything in this crate is synchronous and free of I/O. Record lookup,
//! persistence and audit logging belong to the caller.

pub mod aggregate;
pub mod analysis;
pub mod business;
pub mod config;
pub mod decision;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod normalize;
pub mod priority;
pub mod rationale;
pub mod review;
