//! Shared test utilities for the memory crates
//!
//! - `TestDataBuilder`: deterministic scope ids, record ids and message texts (always available)
//! - `TestQdrant`: Qdrant container with automatic cleanup (feature: "qdrant")
//! - `assertions`: custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["qdrant"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestQdrant};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_qdrant_test() {
//!     let qdrant = TestQdrant::new().await;
//!     let data = TestDataBuilder::from_test_name("my_qdrant_test");
//!
//!     let scope = data.scope_id();
//!     let collection = data.name("memory", "main");
//! }
//! ```

#[cfg(feature = "qdrant")]
mod qdrant;

#[cfg(feature = "qdrant")]
pub use qdrant::TestQdrant;

/// Builder for test data with deterministic randomization
///
/// The same seed always produces the same ids and texts, so failures are
/// reproducible.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_import_export");
    /// assert!(builder.scope_id() < 0);
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Group-chat style scope id: negative and below -1_000_000.
    pub fn scope_id(&self) -> i64 {
        -1_000_000 - (self.seed % 1_000_000_000) as i64
    }

    /// Record id for the `n`th message of the scope (never zero).
    pub fn record_id(&self, n: u32) -> i64 {
        (self.seed % 1_000) as i64 * 100_000 + i64::from(n) + 1
    }

    /// Message text for the `n`th message of the scope.
    pub fn message(&self, n: u32) -> String {
        format!("test message {} of conversation {}", n, self.seed % 10_000)
    }

    /// Generate a unique name for testing
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("memory", "main"), "test-memory-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert two float vectors are equal within `epsilon` per component.
    pub fn assert_vectors_close(actual: &[f32], expected: &[f32], epsilon: f32, context: &str) {
        assert_eq!(
            actual.len(),
            expected.len(),
            "{}: dimension {} != {}",
            context,
            actual.len(),
            expected.len()
        );
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() <= epsilon, "{}: component {} is {}, expected {}", context, i, a, e);
        }
    }
}
