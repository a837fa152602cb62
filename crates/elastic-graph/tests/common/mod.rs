//! Test infrastructure for connection resolution.
//!
//! This module provides a blog post fixture set and an in-memory
//! [`SearchClient`](helios_elastic_graph::SearchClient) that evaluates the
//! query DSL subset the backends emit.

#![allow(dead_code)]

pub mod fixtures;
pub mod memory;

pub use fixtures::*;
pub use memory::*;
