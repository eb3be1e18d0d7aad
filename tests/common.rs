//! 集成测试的公共辅助函数和工具

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::{self, Next},
    response::{Html, Response},
    routing::get,
};
use axum_server::Handle;
use serde_json::json;

use offline_shell::{
    application::build_controller,
    config::{SettingController, SettingServer, Settings},
    consts::{control_prefix, static_dirs},
    http::{Controller, make_server},
};

pub const INDEX: &str = "<html><body><div id=\"root\">Sistema de Asistencia</div></body></html>";
pub const BUNDLE: &str = "console.log('attendance dashboard')";

/// 测试用的静态站点
pub struct TestOrigin {
    pub addr: SocketAddr,
    pub handle: Handle<SocketAddr>,
    hits: Arc<AtomicUsize>,
}

impl TestOrigin {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// 关闭站点，之后的请求都会连接失败
    pub async fn go_offline(&self) {
        self.handle.shutdown();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn count_hits(State(hits): State<Arc<AtomicUsize>>, req: Request, next: Next) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    next.run(req).await
}

/// 启动测试站点，同时提供静态资源和一个简化的考勤 API
pub async fn start_origin() -> TestOrigin {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/", get(|| async { Html(INDEX) }))
        .route(
            "/manifest.json",
            get(|| async {
                Json(json!({
                    "name": "Sistema de Asistencia",
                    "start_url": "/",
                    "display": "standalone"
                }))
            }),
        )
        .route(
            "/static/js/bundle.js",
            get(|| async { ([(CONTENT_TYPE, "text/javascript")], BUNDLE) }),
        )
        .route("/reports", get(|| async { Html("<h1>Reportes</h1>") }))
        .route(
            "/students",
            get(|| async { Json(json!([{ "id": 1, "name": "Ana" }])) })
                .post(|body: String| async move { (StatusCode::CREATED, body) }),
        )
        .layer(middleware::from_fn_with_state(hits.clone(), count_hits));

    let handle = Handle::new();
    let server_handle = handle.clone();
    tokio::spawn(async move {
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("Invalid address");
        axum_server::bind(addr)
            .handle(server_handle)
            .serve(router.into_make_service())
            .await
            .expect("Origin server failed");
    });
    let addr = handle.listening().await.expect("Origin not listening");

    TestOrigin { addr, handle, hits }
}

pub fn controller_settings(origin: &str, exclude_origins: Vec<String>) -> SettingController {
    SettingController {
        generation: "v1".to_string(),
        origin: origin.to_string(),
        shell: vec!["/".to_string(), "/manifest.json".to_string()],
        exclude_origins,
        allow_origins: vec![],
        static_dirs: static_dirs(),
        control_prefix: control_prefix(),
        skip_waiting: false,
        offline_page: None,
    }
}

/// 接受连接但从不响应的站点
pub async fn start_hanging_origin() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind hanging origin");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// 启动承载控制器的服务器
pub async fn start_host(controller: SettingController) -> (Arc<Controller>, SocketAddr) {
    start_host_with_timeout(controller, 10).await
}

pub async fn start_host_with_timeout(
    controller: SettingController,
    timeout: u16,
) -> (Arc<Controller>, SocketAddr) {
    let settings = Settings {
        log_level: "debug".to_string(),
        log_folder: "./logs".to_string(),
        server: SettingServer {
            ip: "127.0.0.1".to_string(),
            port: 0,
            timeout,
            ssl: false,
            certificate: None,
            certificate_key: None,
        },
        controller,
    };
    let controller = build_controller(&settings).expect("Failed to build controller");
    let handle = make_server(
        settings.server.clone(),
        controller.clone(),
        &settings.controller.control_prefix,
    )
    .await
    .expect("Failed to create server");
    let addr = handle.listening().await.expect("Server not listening");
    (controller, addr)
}

/// 不走系统代理的客户端
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(15))
        .build()
        .expect("Failed to build client")
}

pub fn source(res: &reqwest::Response) -> String {
    res.headers()
        .get("x-offline-source")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
