pub mod auth;
pub mod config;
pub mod session;

pub use session::Session;
