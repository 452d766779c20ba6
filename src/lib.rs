pub mod alert;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pattern;
pub mod pipeline;
pub mod query;
pub mod rootcause;
pub mod storage;
pub mod trend;
pub mod types;
