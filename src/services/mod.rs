//! Background services.

pub mod deadline_scheduler;

pub use deadline_scheduler::{DeadlineConfig, DeadlineScheduler};
