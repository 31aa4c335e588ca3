//! services/api/src/lib.rs
//!
//! The HTTP service around the forum answering pipeline: adapters for the
//! forum API and the generation provider, configuration, and the web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
