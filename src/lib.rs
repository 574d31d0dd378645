pub mod binance;
pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod health;
pub mod indicator;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod source;
pub mod strategy;
pub mod supervisor;
