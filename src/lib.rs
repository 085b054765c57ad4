pub mod cli;
pub mod data_paths;
pub mod logging;
pub mod markets;
pub mod server;
pub mod service;
pub mod store;
