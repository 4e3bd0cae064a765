// src/cli/handlers/mod.rs

// One module per command; `dispatcher` maps names to the `handle` functions.

pub mod auth;
pub mod cache;
pub mod commons;
pub mod config;
pub mod install;
pub mod publish;
pub mod run;
pub mod user;
