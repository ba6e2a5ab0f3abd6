//! Bookstore application library
//!
//! Application modules, bootstrap and shared utilities for the bookstore
//! service.

pub mod app;
pub mod modules;
pub mod utils;

pub use modules::*;
