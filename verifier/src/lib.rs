pub mod claim;
pub mod config;
pub mod explorer;
pub mod logger;
pub mod service;
