pub mod calendar_gateway;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod logging;
pub mod oauth_client;
