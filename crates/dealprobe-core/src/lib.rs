pub mod cancel;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod context;
pub mod engine;
pub mod model;
pub mod probe;
pub mod report;
pub mod retry;
pub mod scorer;
pub mod storage;
