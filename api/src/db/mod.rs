//! Postgres access for the routes. Scoring never happens here; rows are
//! mapped to core types and handed back.

pub mod audit;
pub mod business;
pub mod config;
pub mod feedback;
pub mod verification;
