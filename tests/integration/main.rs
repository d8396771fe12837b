//! Integration tests for Black Library
//!
//! These tests use wiremock to serve source pages and run whole jobs
//! through the parsers, the worker pool and the manager.

mod common;
mod index_entry_crawl;
mod linked_list_crawl;
mod manager_flow;
