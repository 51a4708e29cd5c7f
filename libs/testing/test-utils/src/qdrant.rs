//! Qdrant test infrastructure
//!
//! Provides a `TestQdrant` helper that runs a throwaway Qdrant container.

use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const QDRANT_IMAGE: &str = "qdrant/qdrant";
const QDRANT_TAG: &str = "v1.15.1";

/// gRPC port inside the container.
const GRPC_PORT: u16 = 6334;

/// Logged once the gRPC server accepts connections.
const READY_MESSAGE: &str = "gRPC listening on";

/// Test Qdrant wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestQdrant;
///
/// # async fn example() {
/// let qdrant = TestQdrant::new().await;
/// println!("gRPC endpoint: {}", qdrant.url);
/// # }
/// ```
pub struct TestQdrant {
    #[allow(dead_code)]
    container: ContainerAsync<GenericImage>,
    /// gRPC endpoint, e.g. `http://127.0.0.1:49153`.
    pub url: String,
}

impl TestQdrant {
    /// Create a new test Qdrant instance
    ///
    /// Uses the pinned `qdrant/qdrant` image and waits for the gRPC listener.
    pub async fn new() -> Self {
        let container = GenericImage::new(QDRANT_IMAGE, QDRANT_TAG)
            .with_exposed_port(GRPC_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(READY_MESSAGE))
            .start()
            .await
            .expect("Failed to start Qdrant container");

        let host_port = container
            .get_host_port_ipv4(GRPC_PORT)
            .await
            .expect("Failed to get Qdrant gRPC port");

        let url = format!("http://127.0.0.1:{}", host_port);
        tracing::info!(port = host_port, "Test Qdrant ready");

        Self { container, url }
    }
}
