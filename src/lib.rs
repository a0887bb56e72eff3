pub mod api;
pub mod config;
pub mod entry_store;
pub mod obihai_client;
pub mod services;
