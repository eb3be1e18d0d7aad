use std::time::Duration;

use http::{HeaderMap, HeaderName};
use reqwest::Client;
use url::{Origin, Url};

use crate::{
    controller::{CapturedResponse, FetchError, FetchRequest, Fetcher, ResponseKind},
    error::Result,
};

/// 基于 reqwest 的网络访问
///
/// 与站点同源的响应记为 `Basic`，其余为 `Cors`。
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Origin,
}

impl HttpFetcher {
    pub fn new(origin: &Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            origin: origin.origin(),
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CapturedResponse, FetchError> {
        let mut headers = HeaderMap::new();
        copy_headers(&request.headers, &mut headers);

        let res = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| fetch_error(&request.url, err))?;

        let status = res.status();
        let kind = if res.url().origin() == self.origin {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let mut headers = HeaderMap::new();
        copy_headers(res.headers(), &mut headers);
        let body = res
            .bytes()
            .await
            .map_err(|err| fetch_error(&request.url, err))?;

        Ok(CapturedResponse {
            status,
            headers,
            body,
            kind,
            stored_at: None,
        })
    }
}

fn fetch_error(url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

/// 逐跳头部不参与转发，accept-encoding 由 reqwest 自行协商
pub fn is_exclude_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "host"
            | "connection"
            | "proxy-authenticate"
            | "upgrade"
            | "proxy-authorization"
            | "proxy-connection"
            | "keep-alive"
            | "transfer-encoding"
            | "te"
            | "trailer"
            | "accept-encoding"
    )
}

pub fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        if !is_exclude_header(name) {
            to.append(name.clone(), value.clone());
        }
    }
}
