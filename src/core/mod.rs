// src/core/mod.rs

pub mod cache;
pub mod config;
pub mod dependency_gate;
pub mod download_store;
pub mod error;
pub mod identifier;
pub mod installer;
pub mod package;
pub mod paths;
pub mod query_store;
pub mod recipe;
pub mod recipe_file;
pub mod recipe_store;
pub mod runner;
