pub mod calculator;
pub mod config;
pub mod domain;
pub mod http;
pub mod id;
pub mod state;
pub mod version;
