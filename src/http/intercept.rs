use std::sync::Arc;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderValue, Uri};
use tracing::debug;
use url::Url;

use super::{
    error::{RouteError, RouteResult},
    fetcher::{HttpFetcher, copy_headers},
};
use crate::{
    consts::MAX_BODY_SIZE,
    controller::{CacheController, ControlMessage, FetchRequest, LifecycleSnapshot, Served},
};

pub type Controller = CacheController<HttpFetcher>;

/// 响应来源头部：cache / network / passthrough / fallback
pub const OFFLINE_SOURCE: &str = "x-offline-source";

/// 所有非控制通道请求都经过控制器
///
/// 相对路径的请求解析到站点源；以代理形式发来的绝对地址
/// （例如发往外部 API 的请求）保持原样。
pub async fn intercept(
    State(controller): State<Arc<Controller>>,
    request: Request,
) -> RouteResult<Response> {
    let _client = controller.attach_client();
    let (parts, body) = request.into_parts();
    let url = resolve_url(controller.origin(), &parts.uri)?;
    let body = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|err| RouteError::BadRequest(err.to_string()))?;

    let mut headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut headers);
    let fetch_request = FetchRequest::new(parts.method, url)
        .with_headers(headers)
        .with_body(body);

    let served = controller.on_fetch(fetch_request).await?;
    debug!("Served from {}", served.source.as_str());
    Ok(served_response(served))
}

fn resolve_url(origin: &Url, uri: &Uri) -> RouteResult<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|err| RouteError::BadRequest(err.to_string()));
    }
    let path_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    origin
        .join(path_query)
        .map_err(|err| RouteError::BadRequest(err.to_string()))
}

fn served_response(served: Served) -> Response {
    let Served { response, source } = served;
    let mut res = Response::new(Body::from(response.body));
    *res.status_mut() = response.status;
    *res.headers_mut() = response.headers;
    res.headers_mut()
        .insert(OFFLINE_SOURCE, HeaderValue::from_static(source.as_str()));
    res
}

/// 控制通道，未知消息同样返回 204
pub async fn message(State(controller): State<Arc<Controller>>, body: Bytes) -> impl IntoResponse {
    let message = ControlMessage::parse(&body);
    debug!("Control message {:?}", message);
    controller.on_message(message);
    StatusCode::NO_CONTENT
}

pub async fn status(State(controller): State<Arc<Controller>>) -> Json<LifecycleSnapshot> {
    Json(controller.snapshot())
}
