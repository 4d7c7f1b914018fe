#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod config;
pub mod controller;
pub mod data;
pub mod filter;
pub mod logging;
pub mod media;
pub mod poller;
pub mod state;
pub mod store;
pub mod ui;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{print_posts, run, RunOptions};
