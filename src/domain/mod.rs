// Domain layer - readings, tanks and dashboard state
pub mod dashboard;
pub mod error;
pub mod reading;
pub mod tank;
