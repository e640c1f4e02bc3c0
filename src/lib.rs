//! Desired-state builders for the Kafka channel dispatcher workload.
//!
//! The surrounding controller fetches live objects and submits the result via
//! the usual create/update verbs; everything in this crate is pure in-memory
//! assembly of the `Deployment` the dispatcher should run as.

pub mod models;
pub mod resources;
pub mod utils;

pub use models::dispatcher_args::DispatcherArgs;
pub use models::identity::{ContainerRole, DispatcherIdentity};
pub use resources::dispatcher::DispatcherBuilder;
pub use utils::error::Error;
