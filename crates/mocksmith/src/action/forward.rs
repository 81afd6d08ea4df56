//! Forwarding matched requests upstream.

use crate::model::{Body, HttpForward, HttpRequest, HttpResponse, Scheme};
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Sends a request to another host and returns what it answered.
#[async_trait]
pub trait HttpForwarder: Send + Sync {
    async fn forward(&self, request: &HttpRequest, target: &HttpForward)
        -> anyhow::Result<HttpResponse>;
}

/// `HttpForwarder` over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestForwarder {
    client: reqwest::Client,
}

impl ReqwestForwarder {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

/// Absolute URL for `request` on `target`, query string included.
pub(crate) fn target_url(request: &HttpRequest, target: &HttpForward) -> String {
    let scheme = match target.scheme {
        Scheme::Http => "http",
        Scheme::Https => "https",
    };
    let path = match request.path_str() {
        "" => "/",
        path => path,
    };
    let query = request
        .query_string_parameters
        .iter()
        .flat_map(|params| params.entries.iter())
        .flat_map(|entry| {
            entry.values.iter().map(move |value| {
                format!(
                    "{}={}",
                    urlencoding::encode(entry.name.value()),
                    urlencoding::encode(value.value())
                )
            })
        })
        .collect::<Vec<_>>()
        .join("&");
    let mut url = format!("{scheme}://{}:{}{path}", target.host, target.port);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    url
}

#[async_trait]
impl HttpForwarder for ReqwestForwarder {
    async fn forward(
        &self,
        request: &HttpRequest,
        target: &HttpForward,
    ) -> anyhow::Result<HttpResponse> {
        let url = target_url(request, target);
        let method = match request.method_str() {
            "" => reqwest::Method::GET,
            m => reqwest::Method::from_bytes(m.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method '{m}'"))?,
        };
        debug!(%url, %method, "Forwarding request");

        let mut builder = self.client.request(method, &url);
        for entry in request.headers.iter().flat_map(|h| h.entries.iter()) {
            let name = entry.name.value();
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            for value in &entry.values {
                builder = builder.header(name, value.value());
            }
        }
        if let Some(cookies) = &request.cookies {
            let cookie = cookies
                .entries
                .iter()
                .map(|c| format!("{}={}", c.name.value(), c.value.value()))
                .collect::<Vec<_>>()
                .join("; ");
            if !cookie.is_empty() {
                builder = builder.header("cookie", cookie);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.as_bytes());
        }

        let upstream = builder
            .send()
            .await
            .with_context(|| format!("Failed to send forwarded request to {url}"))?;

        let mut response = HttpResponse::default().with_status_code(upstream.status().as_u16());
        if let Some(reason) = upstream.status().canonical_reason() {
            response = response.with_reason_phrase(reason);
        }
        for (name, value) in upstream.headers() {
            response = response.with_header(name.as_str(), value.to_str().unwrap_or(""));
        }
        let bytes = upstream
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))?;
        if !bytes.is_empty() {
            response = response.with_body(match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Body::exact(text),
                Err(e) => Body::binary(e.into_bytes()),
            });
        }
        Ok(response)
    }
}
