//! Fetch layer: page-context scanning and policy text extraction over HTTP.

mod client;
pub mod extract;

pub use client::{FetchConfig, FetchError, PolicyClient};
