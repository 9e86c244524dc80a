// serve.rs — Start the MCP server on stdio.

use rmcp::ServiceExt;
use pg_gateway::{GuardConfig, PolicyGuardServer};

pub fn execute(config: GuardConfig) -> anyhow::Result<()> {
    let server = PolicyGuardServer::new(config)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        tracing::info!("policyguard MCP server listening on stdio");
        let transport = rmcp::transport::stdio();
        let server_handle = server
            .serve(transport)
            .await
            .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;
        let _ = server_handle.waiting().await;
        Ok::<(), anyhow::Error>(())
    })
}
