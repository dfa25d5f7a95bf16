//! Shared test helpers for `chime-core` integration tests.
//!
//! These helpers provide reusable fixtures and lightweight mocks so the
//! service tests can focus on behaviour instead of boilerplate.

pub mod calendar;
pub mod clock;
pub mod crypto;
pub mod fixtures;
pub mod gateway;
pub mod store;
