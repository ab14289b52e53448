//! libcurl-backed transport.
//!
//! Each request runs on a blocking worker (`spawn_blocking`) with its own Easy
//! handle.

use std::time::Duration;

use super::error::TransportError;
use super::transport::{ApiRequest, ApiResponse, Method, Transport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Production transport. Cheap to construct; holds only timeouts.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    timeout: Duration,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            timeout: TOTAL_TIMEOUT,
        }
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
        }
    }
}

impl Transport for CurlTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let connect_timeout = self.connect_timeout;
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || perform(&request, connect_timeout, timeout))
            .await
            .map_err(|e| TransportError::Other(format!("transport task join: {e}")))?
    }
}

/// Performs one request on the current thread.
fn perform(
    request: &ApiRequest,
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<ApiResponse, TransportError> {
    let mut body: Vec<u8> = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url).map_err(map_curl_error)?;
    easy.follow_location(true).map_err(map_curl_error)?;
    easy.connect_timeout(connect_timeout).map_err(map_curl_error)?;
    easy.timeout(timeout).map_err(map_curl_error)?;

    let mut list = curl::easy::List::new();
    list.append("Accept: application/json").map_err(map_curl_error)?;
    if !request.credential.is_empty() {
        list.append(&format!("Authorization: Bearer {}", request.credential.expose()))
            .map_err(map_curl_error)?;
    }

    if request.method == Method::Post {
        let payload = request
            .json_body
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());
        list.append("Content-Type: application/json").map_err(map_curl_error)?;
        easy.post(true).map_err(map_curl_error)?;
        easy.post_fields_copy(payload.as_bytes()).map_err(map_curl_error)?;
    }
    easy.http_headers(list).map_err(map_curl_error)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(map_curl_error)?;
        transfer.perform().map_err(map_curl_error)?;
    }

    let status = easy.response_code().map_err(map_curl_error)?;
    Ok(ApiResponse {
        status: u16::try_from(status).unwrap_or(0),
        body,
    })
}

/// Map a curl error onto the transport taxonomy.
fn map_curl_error(e: curl::Error) -> TransportError {
    if e.is_operation_timedout() {
        return TransportError::Timeout(e.to_string());
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return TransportError::Connection(e.to_string());
    }
    TransportError::Other(e.to_string())
}
