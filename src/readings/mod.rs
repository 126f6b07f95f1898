//! Glucose reading queries on top of the credential lifecycle.

pub mod client;
pub mod reading;

pub use client::GlucoseClient;
pub use reading::GlucoseReading;
