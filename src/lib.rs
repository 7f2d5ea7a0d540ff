#![allow(clippy::uninlined_format_args)]

pub mod actions;
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod post_view;
pub mod relative_time;
pub mod route;
pub mod store;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
