//! Integration tests for Herbarium-Harvest

mod http_source_tests;
mod pipeline_tests;
