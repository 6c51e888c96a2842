//! HTTP request handlers.
//!
//! - [`upload`]: The upload, rank and notify pipeline
//! - [`static_assets`]: Front-end asset serving
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts into the matching HTTP status code and
//! a JSON `{"message": ...}` body.

pub mod static_assets;
pub mod upload;
