//! Integration tests for the skein synchronization engine

mod cancellation;
mod session_pipeline;
mod test_utils;
