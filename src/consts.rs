use std::{env, time::Duration};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMPILER: &str = env!("RUA_COMPILER");
pub const OS: &str = env::consts::OS;
pub const ARCH: &str = env::consts::ARCH;

// config defaults
pub const LOG_LEVEL: &str = "info";
pub fn log_level() -> String {
    LOG_LEVEL.to_string()
}

pub const LOG_FOLDER: &str = "./logs";
pub fn log_folder() -> String {
    LOG_FOLDER.to_string()
}

pub const PROCESS_TIMEOUT: u16 = 75;
pub fn process_timeout() -> u16 {
    PROCESS_TIMEOUT
}

/// 网络超时比请求处理超时至少提前这么久
pub const FETCH_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

pub const SHELL_RESOURCES: [&str; 2] = ["/", "/manifest.json"];
pub fn shell_resources() -> Vec<String> {
    SHELL_RESOURCES.map(|r| r.to_string()).to_vec()
}

/// 外部考勤 API，永远不经过缓存
pub const API_ORIGIN: &str = "https://back-uqvd.onrender.com";
pub fn exclude_origins() -> Vec<String> {
    vec![API_ORIGIN.to_string()]
}

pub const STATIC_DIRS: [&str; 2] = ["/static/**", "/_next/static/**"];
pub fn static_dirs() -> Vec<String> {
    STATIC_DIRS.map(|d| d.to_string()).to_vec()
}

pub const CONTROL_PREFIX: &str = "/__offline";
pub fn control_prefix() -> String {
    CONTROL_PREFIX.to_string()
}

/// 控制通道请求体上限
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;
/// 转发请求体上限
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
