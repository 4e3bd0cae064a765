//! # Controllers
//!
//! Account and publishing workflows built on the registry layer:
//!
//! - **`auth`**: sign-up, login and the config-backed session.
//! - **`user`**: username and e-mail changes.
//! - **`recipe_controller`**: the registry records a publish needs.
//! - **`publish`**: the ordered publish pipeline, ending in the upload.

pub mod auth;
pub mod publish;
pub mod recipe_controller;
pub mod user;
