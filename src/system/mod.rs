//! # System Interaction Layer
//!
//! Boundaries between the core logic and the outside world.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external processes (recipe entry points, the package
//!   manager), with a `cmd /C` fallback on Windows and output capture.
//! - **`package_manager`**: the `PackageManager` contract and its command-line
//!   implementation used to install recipe dependencies.
//! - **`transport`**: downloads package tarballs (`http(s)://` and `file://`) and
//!   uploads them to a publish server.

pub mod executor;
pub mod package_manager;
pub mod transport;
