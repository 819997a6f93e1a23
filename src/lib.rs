//! Time tracking API with a declarative query filter engine and a
//! tag-invalidated result cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
