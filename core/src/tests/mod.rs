//! Tests for the statement engine
//!
//! Organized by feature area

mod helpers;
mod switch_tests;
mod traverse_tests;
