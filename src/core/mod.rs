//! Session Core Components
//!
//! Cache access, authorization state, PKCE, provider seams, hooks and path
//! resolution shared by the flows.

pub mod cache;
pub mod hooks;
pub mod paths;
pub mod pkce;
pub mod provider;
pub mod state;

pub use cache::*;
pub use hooks::*;
pub use paths::*;
pub use pkce::*;
pub use provider::*;
pub use state::*;
