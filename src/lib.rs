// Library surface for headless/integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod capture;
pub mod config;
pub mod controller;
pub mod document;
pub mod engine;
pub mod layout;
pub mod logging;
pub mod message;
pub mod runtime;
pub mod segment;
pub mod session;
pub mod surface;
pub mod timer;
pub mod ui;
