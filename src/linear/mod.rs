//! Linear API collaborators
//!
//! - `backend`: the remote call contract used by the integration flow
//! - `client`: reqwest implementation against Linear and the integration service
//! - `auth_url`: outbound authorization URL
//! - `types`: wire types

mod auth_url;
mod backend;
mod client;
pub mod types;

pub use auth_url::authorization_url;
pub use backend::LinearBackend;
pub use client::HttpLinearBackend;
