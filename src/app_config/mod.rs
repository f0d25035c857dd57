pub mod db;
pub mod env;
pub mod log;
pub mod redis;
pub mod settings;

pub use settings::AppConfig;
