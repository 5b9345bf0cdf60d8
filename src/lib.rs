pub mod core;
pub mod models;
pub mod storage;
pub mod ui;
