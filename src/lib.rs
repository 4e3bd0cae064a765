//! # recipe-runner
//!
//! Resolve, install and run versioned build recipes published to a key-path
//! registry, and publish new versions of your own.
//!
//! - **`core`**: resolution, downloads, installation, execution and config.
//! - **`registry`**: the key-path store, typed record access and publish acceptance.
//! - **`controllers`**: accounts and the publish pipeline.
//! - **`system`**: processes, the package manager and package transport.
//! - **`state`**: the composition root wiring it all together.
//! - **`cli`**: the thin command layer used by the `recipe` binary.

pub mod cli;
pub mod constants;
pub mod controllers;
pub mod core;
pub mod models;
pub mod registry;
pub mod state;
pub mod system;
