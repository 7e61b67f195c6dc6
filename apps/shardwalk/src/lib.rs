//! # shardwalk
//!
//! Command-line front end for `shardwalk-core`: LDBC-style schema, JSON
//! fixtures, query compositions and a parallel workload driver.

pub mod cli;
pub mod config;
pub mod fixture;
pub mod ops;
pub mod schema;
