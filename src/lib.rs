pub mod action;
pub mod app;
pub mod config;
pub mod display;
pub mod event;
pub mod format;
pub mod logging;
pub mod scheduler;
pub mod system;
pub mod ui;
