//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Agent registration, lookup and action handlers.
pub mod agents;
/// Batch extraction handler.
pub mod extraction;
/// Service banner and health probe.
pub mod health;
/// Task CRUD and run handlers.
pub mod tasks;
