//! Rotate command implementation

use anyhow::Result;

use tt_protocol::NEXT_PATH;

use crate::output::{print_error, print_success, print_warning};

/// Control URL that triggers a rotation, given the control base URL
pub fn rotate_url(control: &str) -> String {
    format!("{}/{}", control.trim_end_matches('/'), NEXT_PATH)
}

/// Ask a running testbed to move to the next pin generation
pub async fn rotate_command(control: &str) -> Result<()> {
    let url = rotate_url(control);
    tracing::debug!("Requesting rotation via {}", url);

    let response = match reqwest::get(&url).await {
        Ok(r) => r,
        Err(e) => {
            print_warning("Is the testbed running? Try: tack-testbed server -c CERT -k KEY");
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to reach control server at {}", control)));
        }
    };
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        print_success(&body);
        Ok(())
    } else {
        print_error(&format!("Rotation failed ({}): {}", status, body));
        anyhow::bail!("rotation failed with status {}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_url() {
        assert_eq!(rotate_url("http://127.0.0.1:8080"), "http://127.0.0.1:8080/next");
        assert_eq!(rotate_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080/next");
    }
}
