//! LSP Protocol Implementation
//!
//! Backend state, request handlers and the stdio server entry point.

pub mod backend;
pub mod document;
pub mod handlers;
pub mod server;

pub use backend::Backend;
