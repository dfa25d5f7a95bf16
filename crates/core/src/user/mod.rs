//! User registration and credential management

pub mod service;

pub use service::UserService;
