//! Integration test suite for drover.
//!
//! These tests exercise the agent end to end against a temporary project
//! directory and a stub editor binary that records its invocations. They
//! verify admission, dispatch, and lifecycle behavior working together.
//!
//! # Test Categories
//!
//! - `queue_polling`: admission and idempotent polling
//! - `dispatch`: executor selection and command-line construction
//! - `lifecycle`: run loop, graceful stop, degraded operation
//!
//! # CI Compatibility
//!
//! No real editor is required; the stub tool is a shell script, so the
//! suite is safe to run anywhere with a POSIX shell.

mod fixtures;

mod dispatch;
