use serde_json::Value;

pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// 页面通过控制通道发来的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// 让等待中的代立即激活
    SkipWaiting,
    /// 未知命令，忽略
    Unknown(String),
}

impl ControlMessage {
    /// 解析 `{"type":"SKIP_WAITING"}` 或 `"SKIP_WAITING"`
    pub fn parse(payload: &[u8]) -> Self {
        let kind = match serde_json::from_slice::<Value>(payload) {
            Ok(Value::String(kind)) => kind,
            Ok(Value::Object(map)) => map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Ok(other) => other.to_string(),
            Err(_) => String::from_utf8_lossy(payload).into_owned(),
        };
        match kind.as_str() {
            SKIP_WAITING => ControlMessage::SkipWaiting,
            _ => ControlMessage::Unknown(kind),
        }
    }
}
