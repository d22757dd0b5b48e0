// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_insight_client;
pub mod json_session_store;
