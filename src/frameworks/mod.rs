// Frameworks layer: configuration, storage bootstrap and the HTTP server.

pub mod config;
pub mod db;
pub mod server;
