//! Client command implementation

use anyhow::Result;

use tt_server::probe;

use crate::output::{format_report, print_error, print_success};

/// Probe a TLS echo server and print the trust assertion it presents.
///
/// With `message`, also sends it over a fresh session and prints the echo.
pub async fn client_command(
    addr: &str,
    server_name: &str,
    message: Option<&str>,
    json: bool,
) -> Result<()> {
    let report = match probe::probe(addr, server_name).await {
        Ok(r) => r,
        Err(e) => {
            print_error(&format!("Failed to probe {}: {}", addr, e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(&report));
    }

    if let Some(message) = message {
        let echoed = probe::echo(addr, server_name, message.as_bytes()).await?;
        if echoed == message.as_bytes() {
            print_success(&format!("Echoed {} bytes", echoed.len()));
        } else {
            print_error(&format!(
                "Echo mismatch: sent {} bytes, received {}",
                message.len(),
                echoed.len()
            ));
            anyhow::bail!("echo mismatch");
        }
    }

    Ok(())
}
