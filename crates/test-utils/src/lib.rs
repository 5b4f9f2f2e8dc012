// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for isutrace
//!
//! This crate provides common testing components including:
//! - A scriptable in-memory mock driver
//! - A call journal for asserting pass-through behavior

pub mod mock_driver;

// Re-exports for convenience
pub use mock_driver::{MockCall, MockDriver, MockDriverBuilder};
