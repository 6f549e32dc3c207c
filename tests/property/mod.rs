//! Property-based tests for identity guarantees

mod determinism;
