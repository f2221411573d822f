//! Integration tests module
//!
//! This module organizes all integration tests for the soundscape engine.

pub mod config_test;
pub mod engine_test;
pub mod soundscape_test;
pub mod timer_test;
