//! Error conversions between external crates and the domain error.

pub mod conversions;

pub use conversions::InfraError;
