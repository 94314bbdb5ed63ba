//! Nominatim geocoding provider

pub mod client;
pub mod types;

pub use client::NominatimClient;
