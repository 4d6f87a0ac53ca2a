//! Test helper modules for radio-server integration tests

#![allow(dead_code)]

pub mod test_server;

pub use test_server::{body_json, body_text, TestServer};
