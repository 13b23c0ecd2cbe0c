//! HTTP implementation of the record gateway.
//!
//! Speaks the platform's record REST API and maps its responses into the
//! `formlink-core` error taxonomy. The crate is deliberately thin: no retry
//! logic lives here, callers own their retry policy.

mod client;

pub use client::PlatformClient;
