//! Service Layer
//!
//! Business logic shared by the HTTP routes, kept free of extractor and
//! response types.

mod order_service;

pub use order_service::*;
