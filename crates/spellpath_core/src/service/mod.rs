//! Session use-case layer.
//!
//! # Responsibility
//! - Orchestrate store, lock and engine calls into the session actions.
//! - Keep the JSON boundary and CLI decoupled from storage details.

pub mod assessment;
pub mod contract;
pub mod error;
pub mod selection;
pub mod session_service;
pub mod stats;
