pub mod config;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod surface;
pub mod worker;
pub mod workload;

// Owner thread, render feed and terminal front end
pub mod app;
pub mod render;
pub mod ui;

pub use error::{Error, Result};
