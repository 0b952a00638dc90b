// Presentation layer - JSON surface for the chart client
pub mod app_state;
pub mod handlers;
pub mod view_model;
