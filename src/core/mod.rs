//! Core library modules for butterfly-pairs
//!
//! This module contains the internal implementation details of the butterfly-pairs library.

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod http;
pub mod ingest;
pub mod pairs;
pub mod provider;
pub mod sink;
