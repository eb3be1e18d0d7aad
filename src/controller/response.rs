use axum::body::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};

use crate::http::mime::TEXT_HTML_UTF_8;

/// 响应类型，同源响应才可以写入缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// 同源
    Basic,
    /// 跨源
    Cors,
}

/// 已完整读取的响应
///
/// body 使用 `Bytes`，复制只增加引用计数，
/// 因此同一份响应可以同时返回给调用方并写入缓存。
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
    /// 写入缓存的时间，网络响应为 None
    pub stored_at: Option<DateTime<Utc>>,
}

impl CapturedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
            stored_at: None,
        }
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// 离线页面
    pub fn offline(document: Bytes) -> Self {
        Self::new(StatusCode::OK, document)
            .with_header(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML_UTF_8))
    }

    /// 把可读内容拆成两个互不影响的句柄
    pub fn tee(self) -> (Self, Self) {
        (self.clone(), self)
    }

    /// 只有 200 的同源响应可以缓存
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.kind == ResponseKind::Basic
    }
}

/// 网络和缓存都不可用时返回的页面
pub const OFFLINE_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Sistema de Asistencia - Sin conexión</title>
  <style>
    body { font-family: system-ui, sans-serif; background: #eef2ff; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; }
    .offline-notice { background: #fff; border-radius: 12px; padding: 2rem; max-width: 28rem; text-align: center; box-shadow: 0 4px 12px rgba(0, 0, 0, .08); }
    .offline-notice h1 { color: #dc2626; font-size: 1.25rem; }
  </style>
</head>
<body>
  <div class="offline-notice">
    <h1>Sin conexión</h1>
    <p>No se pudo cargar la aplicación. Revisa tu conexión a internet e inténtalo de nuevo.</p>
    <button onclick="location.reload()">Reintentar</button>
  </div>
</body>
</html>
"#;
