//! End-to-end tests for the editing workflow.
//!
//! These tests drive a full session the way a front end would and check the
//! objects that come out of it.

mod multi_view_tests;
