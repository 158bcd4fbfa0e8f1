//! HTTP client for the dataset conversion service.
//!
//! Provides the wire message types, a [`reqwest`]-backed API wrapper for
//! the four service endpoints (upload, status, cancel, download), and the
//! [`transport::Transport`] trait the job controller is written against.

pub mod api;
pub mod messages;
pub mod transport;
