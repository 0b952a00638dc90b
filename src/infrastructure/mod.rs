// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod oauth_provider;
pub mod sheets_client;
