//! The default HTTP downloader, backed by `reqwest`.

use super::Downloader;
use crate::error::SpiderError;
use crate::request::Request;
use crate::response::RawResponse;
use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, trace};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// 1 GiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024 * 1024;

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Downloads requests with a shared `reqwest::Client`.
///
/// Bodies are read chunk by chunk and silently truncated at
/// `max_body_size`. Exceeding the redirect limit surfaces as a transport
/// error.
#[derive(Debug, Clone)]
pub struct ReqwestClientDownloader {
    client: Client,
    max_body_size: usize,
}

impl Default for ReqwestClientDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_BODY_SIZE, true)
            .unwrap_or_else(|_| Self::with_client(Client::new(), DEFAULT_MAX_BODY_SIZE))
    }
}

impl ReqwestClientDownloader {
    /// Builds a client with the given limits. `max_redirects == 0` disables
    /// redirect following entirely.
    pub fn new(
        timeout: Duration,
        max_redirects: usize,
        max_body_size: usize,
        cookies: bool,
    ) -> Result<Self, SpiderError> {
        let redirect = if max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(max_redirects)
        };
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .cookie_store(cookies)
            .build()?;
        Ok(Self::with_client(client, max_body_size))
    }

    pub fn with_client(client: Client, max_body_size: usize) -> Self {
        Self {
            client,
            max_body_size,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Downloader for ReqwestClientDownloader {
    async fn download(&self, request: &Request) -> Result<RawResponse, SpiderError> {
        trace!("Sending {} {}", request.method, request.url);
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let mut response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            let remaining = self.max_body_size - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!("Body of {} truncated at {} bytes", url, self.max_body_size);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status,
            headers,
            url,
            body: body.freeze(),
            cached: false,
        })
    }
}
