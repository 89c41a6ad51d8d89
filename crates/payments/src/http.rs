use std::time::Duration;

use reqwest::Client;

use crate::{GatewayError, Result};

/// Default bound on a single processor call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Http(e.to_string()))
}

pub(crate) fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_normalizes_slashes() {
        assert_eq!(
            join("https://api.paystack.co/", "/transaction/initialize"),
            "https://api.paystack.co/transaction/initialize"
        );
        assert_eq!(join("http://localhost:1234", "v1/x"), "http://localhost:1234/v1/x");
    }
}
