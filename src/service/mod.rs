pub mod runner;

pub use runner::{CloudTrailService, CycleReport, ServiceError, ServiceState};
