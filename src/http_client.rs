use anyhow::{bail, Result};
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::info;

use crate::debug_flags;

const TIMEOUT_MS: u64 = 15_000;
const MAX_BODY_BYTES: usize = 32_768;

/// HTTP response with the status preserved so callers can branch on it.
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

fn new_connection() -> Result<EspHttpConnection> {
    let config = Configuration {
        timeout: Some(std::time::Duration::from_millis(TIMEOUT_MS)),
        use_global_ca_store: true,
        crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
        ..Default::default()
    };
    Ok(EspHttpConnection::new(&config)?)
}

/// Perform an HTTPS GET request with custom headers.
///
/// Transport failures are errors; HTTP-level failures are not. The body is
/// only read for 200 responses, otherwise it comes back empty.
pub fn https_get(url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
    use embedded_svc::http::client::Client;
    use embedded_svc::http::Method;

    let mut client = Client::wrap(new_connection()?);
    let response = client.request(Method::Get, url, headers)?.submit()?;
    read_response(url, response)
}

/// Perform an HTTPS POST with a JSON body and custom headers.
pub fn https_post_json(url: &str, headers: &[(&str, &str)], body: &str) -> Result<HttpResponse> {
    use embedded_svc::http::client::Client;
    use embedded_svc::http::Method;
    use embedded_svc::io::Write;

    let content_length = body.len().to_string();
    let mut all_headers = Vec::with_capacity(headers.len() + 1);
    all_headers.extend_from_slice(headers);
    all_headers.push(("Content-Length", content_length.as_str()));

    let mut client = Client::wrap(new_connection()?);
    let mut request = client.request(Method::Post, url, &all_headers)?;
    request.write_all(body.as_bytes())?;
    request.flush()?;
    let response = request.submit()?;
    read_response(url, response)
}

fn read_response(
    url: &str,
    mut response: embedded_svc::http::client::Response<&mut EspHttpConnection>,
) -> Result<HttpResponse> {
    use embedded_svc::io::Read;

    let status = response.status();
    if debug_flags::is_on(&debug_flags::DEBUG_API) {
        info!(
            "HTTP {} -> status {}",
            url.chars().take(80).collect::<String>(),
            status
        );
    }

    if status != 200 {
        return Ok(HttpResponse {
            status,
            body: String::new(),
        });
    }

    let mut body: Vec<u8> = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = response.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > MAX_BODY_BYTES {
            bail!("Response too large (>{} bytes)", MAX_BODY_BYTES);
        }
    }

    Ok(HttpResponse {
        status,
        body: String::from_utf8(body)?,
    })
}
