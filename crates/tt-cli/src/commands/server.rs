//! Server command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tt_core::config::TestbedConfig;
use tt_server::launch::shutdown_on_signal;
use tt_server::Testbed;

use crate::output::{print_info, print_success};

/// Run both services in the foreground until Ctrl+C or SIGTERM
pub async fn server_command(config: &TestbedConfig) -> Result<()> {
    let cancel = CancellationToken::new();

    shutdown_on_signal(cancel.clone());

    let testbed = Testbed::start(config, cancel).await?;

    let status = testbed.status().snapshot();
    print_success(&format!("TLS echo server on {}", testbed.tls_addr()));
    print_success(&format!("Control server on http://{}", testbed.control_addr()));
    print_info(&format!(
        "Pinning {} at generation {}",
        status.fingerprint, status.generation
    ));

    testbed.wait().await?;

    print_info("Testbed stopped");
    Ok(())
}
