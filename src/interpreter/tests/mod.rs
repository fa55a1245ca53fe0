//! End-to-end tests: JSON programs run through `Execution`

mod helpers;

mod basic_tests;
mod call_tests;
mod control_tests;
