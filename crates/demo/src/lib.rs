//! Demo application for the formtree engine.
//!
//! Binds JSON submissions onto the demo forms against an in-memory store and
//! reports errors and the resulting tables.

pub mod catalog;
pub mod session;
