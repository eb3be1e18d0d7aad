use std::future::Future;

use super::{request::FetchRequest, response::CapturedResponse};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("network request to {0} timed out")]
    Timeout(String),
}

/// 控制器访问网络的方式，由宿主环境提供
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<CapturedResponse, FetchError>> + Send;
}
