//! The seam between the session and whatever produces actor replies.

use async_trait::async_trait;
use invoke::{InvocationRequest, InvocationResponse, InvokeClient};

/// Produces an actor's next line.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, invoke::Error>;
}

#[async_trait]
impl Inference for InvokeClient {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, invoke::Error> {
        InvokeClient::invoke(self, request).await
    }
}
