//! Linear webhook integration flow
//!
//! - `verifier`: CSRF token issued before the redirect and checked on return
//! - `controller`: auth state machine (code exchange, context load)
//! - `deployment`: team selection, dedup check and webhook deployment
//! - `storage` / `location`: injected key-value store and navigation location
//! - `host`: callbacks and alerts for the embedding application
//!
//! # Usage
//! ```ignore
//! let controller = AuthFlowController::new(config, storage, location, backend.clone(), host.clone());
//! controller.run().await?;
//! let deployer = TeamDeployer::new(controller.session().unwrap(), backend, host);
//! deployer.select_team(team).await?;
//! deployer.deploy().await?;
//! ```

mod controller;
mod deployment;
mod error;
mod host;
mod location;
mod storage;
#[cfg(test)]
mod testing;
pub mod types;
mod verifier;

pub use controller::AuthFlowController;
pub use deployment::TeamDeployer;
pub use error::IntegrationError;
pub use host::IntegrationHost;
pub use location::UrlLocation;
#[cfg(test)]
pub use storage::MemoryStorage;
pub use storage::{CONTEXT_KEY, FileStorage, Storage};
