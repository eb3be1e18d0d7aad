use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use http::StatusCode;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, info};

use crate::{
    config::SettingServer,
    consts::MAX_MESSAGE_SIZE,
    middlewares::{add_version, logging_route},
};

pub mod error;
// 通过 reqwest 访问网络
pub mod fetcher;
// 拦截请求与控制通道
pub mod intercept;
pub mod mime;

pub use fetcher::HttpFetcher;
pub use intercept::{Controller, OFFLINE_SOURCE};

/// 构建路由
///
/// 控制通道挂在 `control_prefix` 下，其余所有请求交给控制器拦截。
pub fn make_router(controller: Arc<Controller>, control_prefix: &str, timeout: u16) -> Router {
    let message_path = format!("{control_prefix}/message");
    let status_path = format!("{control_prefix}/status");

    let router = Router::new()
        .route(
            &message_path,
            post(intercept::message).layer(DefaultBodyLimit::max(MAX_MESSAGE_SIZE)),
        )
        .route(&status_path, get(intercept::status))
        .fallback(intercept::intercept)
        .with_state(controller)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(add_version))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::SERVICE_UNAVAILABLE,
                    Duration::from_secs(timeout.into()),
                )),
        );
    debug!("Control routes registered: {}, {}", message_path, status_path);

    logging_route(router)
}

/// 启动服务器，返回用于优雅关闭的句柄
pub async fn make_server(
    server: SettingServer,
    controller: Arc<Controller>,
    control_prefix: &str,
) -> anyhow::Result<Handle<SocketAddr>> {
    debug!("make_server start with server: {:?}", server);
    let router = make_router(controller, control_prefix, server.timeout);

    let addr = format!("{}:{}", server.ip, server.port);
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address {addr}"))?;

    let handle = Handle::new();
    let handle_clone = handle.clone();

    let tls = match (server.ssl, server.certificate, server.certificate_key) {
        (true, Some(cert), Some(key)) => {
            debug!("Certificate: {} Certificate key: {}", cert, key);
            Some(
                RustlsConfig::from_pem_file(&cert, &key)
                    .await
                    .with_context(|| "load certificate failed")?,
            )
        }
        _ => None,
    };

    // 生成一个任务来运行服务器
    tokio::spawn(async move {
        let result = match tls {
            Some(rustls_config) => {
                info!("Listening on https://{}", addr);
                axum_server::bind_rustls(addr, rustls_config)
                    .handle(handle_clone)
                    .serve(router.into_make_service())
                    .await
            }
            None => {
                info!("Listening on http://{}", addr);
                axum_server::bind(addr)
                    .handle(handle_clone)
                    .serve(router.into_make_service())
                    .await
            }
        };
        if let Err(err) = result {
            error!("Server on {} stopped: {:?}", addr, err);
        }
    });

    Ok(handle)
}

/// 优雅关闭所有服务器
///
/// 服务器将在 30 秒内完成正在处理的请求后停止。
pub async fn shutdown_servers(handles: &mut Vec<Handle<SocketAddr>>) {
    for handle in handles.iter() {
        handle.graceful_shutdown(Some(Duration::from_secs(30)));
    }
    handles.clear();
    info!("All servers have been signaled to shut down");
}
