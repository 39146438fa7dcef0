use log::debug;
use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::ServiceError;

/// Build the shared HTTP client. A proxy URL routes every request through it.
pub fn create_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> reqwest::Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent).timeout(timeout);
    if let Some(url) = proxy {
        builder = builder.proxy(Proxy::all(url)?);
    }
    builder.build()
}

/// GET a URL with query parameters and decode a JSON body.
/// Non-success statuses are classified via [`ServiceError::from_status`].
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    context: &str,
) -> Result<T, ServiceError> {
    debug!("GET {} ({})", url, context);

    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::from_status(status, context));
    }

    let body = response.text().await?;
    decode_json(&body, context)
}

/// Decode a response body; a body that does not match `T` is malformed
fn decode_json<T: DeserializeOwned>(body: &str, context: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::malformed(format!("{} ({})", e, context)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json() {
        let values: Vec<u32> = decode_json("[1, 2]", "list").unwrap();
        assert_eq!(values, vec![1, 2]);

        let err = decode_json::<Vec<u32>>("<html>rate limited</html>", "list").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("list"));
    }
}
