//! Integration test suite for handler-demo.
//!
//! These tests drive the dispatch queue, the owner-affine surface and the
//! workers together across real threads.
//!
//! # Test Categories
//!
//! - `dispatch_properties`: ordering, delivery and isolation of the queue
//! - `demo_lifecycle`: full demo start/shutdown in queue and direct modes

mod fixtures;

mod demo_lifecycle;
mod dispatch_properties;
