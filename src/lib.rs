pub mod app;
pub mod app_config;
pub mod error;
pub mod market;
pub mod time_util;
