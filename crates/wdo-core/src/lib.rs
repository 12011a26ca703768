pub mod config;
pub mod logging;
pub mod settings;

pub mod api;
pub mod batch;
pub mod layout;
pub mod plan;
pub mod pool;
pub mod report;
pub mod retry;
pub mod select;
pub mod storage;
