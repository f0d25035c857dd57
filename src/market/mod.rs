pub mod cache;
pub mod eastmoney;
pub mod indicator;
pub mod model;
pub mod normalizer;
pub mod repository;
pub mod retry;
pub mod services;
