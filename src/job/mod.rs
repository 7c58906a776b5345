mod controller;
mod delivery;
mod error;
mod progress;
mod throttle;

pub use controller::{Job, JobController, JobSettings, JobStatus};
pub use error::JobError;
