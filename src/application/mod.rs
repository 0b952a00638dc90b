// Application layer - load orchestration and auth sequencing
pub mod auth_gate;
pub mod dashboard_controller;
pub mod data_loader;
pub mod spreadsheet_source;
pub mod tank_aggregator;
