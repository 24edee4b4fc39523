// Core types for the mock interview service: session model, question bank,
// configuration, and session storage.

pub mod config;
pub mod db;
pub mod model;
pub mod questions;
pub mod store;
