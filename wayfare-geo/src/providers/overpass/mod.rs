//! Overpass area search provider

pub mod client;
pub mod query;
pub mod types;

pub use client::OverpassClient;
