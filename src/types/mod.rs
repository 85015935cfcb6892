//! Session Types
//!
//! Data model for authorization attempts, sessions, requests and responses.

pub mod attempt;
pub mod callback;
pub mod config;
pub mod request;
pub mod response;
pub mod token;

pub use attempt::*;
pub use callback::*;
pub use config::*;
pub use request::*;
pub use response::*;
pub use token::*;
