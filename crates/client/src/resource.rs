use async_trait::async_trait;
use jambda_models::{ClientError, FunctionConfiguration, FunctionResource, Payload};

/// Typed facade over the function control plane.
///
/// Every call performs exactly one network exchange and never retries;
/// retry policy belongs to the caller.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn list(&self) -> Result<Vec<FunctionResource>, ClientError>;

    async fn create(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
        payload: &Payload,
    ) -> Result<FunctionResource, ClientError>;

    async fn update(
        &self,
        external_id: &str,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionResource, ClientError>;

    async fn remove(&self, external_id: &str) -> Result<(), ClientError>;
}
