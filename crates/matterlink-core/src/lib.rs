// matterlink-core: Domain layer for the Matter bridge control plane.
//
// Owns the device registry, attribute/command translation, and the
// controller that drives a `matterlink-api` session.

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;

pub use command::DeviceCommand;
pub use config::ControllerConfig;
pub use controller::{CommissioningJob, ConnectionState, Controller, JobState};
pub use error::CoreError;
pub use model::{Device, DeviceState, DeviceType};
pub use store::DeviceStore;
