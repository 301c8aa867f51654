//! Integration tests for schemadiff against a live MySQL server.
//!
//! These tests are behind the `integration-tests` feature flag and won't run
//! with regular `cargo test`. They need `TEST_MYSQL_DSN` pointing at a server
//! where the user may create and drop databases, e.g.
//! `root:root@tcp(127.0.0.1:3306)/schemadiff_test`.

#![cfg(feature = "integration-tests")]

mod mysql;
