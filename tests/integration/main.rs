//! Integration test modules.

mod config_test;
mod session_flow_test;
