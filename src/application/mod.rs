//! Application layer: query translation, pagination, repository contracts
//! and the entity services built on them.

pub mod error;
pub mod filter;
pub mod pagination;
pub mod repos;
pub mod services;
