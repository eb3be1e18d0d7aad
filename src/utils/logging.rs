use std::{fs, str::FromStr};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::consts::{LOG_LEVEL, NAME};

/// 日志文件名前缀，按天滚动时追加日期
pub fn log_file_prefix() -> String {
    format!("{}.log", NAME.replace('-', "_"))
}

/// 配置里的级别无法解析时退回默认级别
fn level_filter(log_level: &str) -> (EnvFilter, bool) {
    match EnvFilter::from_str(log_level) {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(LOG_LEVEL), false),
    }
}

/// 初始化日志，同时输出到控制台和 `log_folder` 下按天滚动的文件
///
/// 返回的 guard 需要持有到进程结束，否则文件里会丢失尾部日志。
pub fn init_logger(log_level: &str, log_folder: &str) -> anyhow::Result<WorkerGuard> {
    fs::create_dir_all(log_folder)
        .with_context(|| format!("failed to create log folder {log_folder}"))?;
    let file_appender = tracing_appender::rolling::daily(log_folder, log_file_prefix());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(non_blocking);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let (filter, parsed) = level_filter(log_level);
    let collector = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(collector)
        .with_context(|| "failed to set the global collector")?;

    if !parsed {
        tracing::warn!("Invalid log_level {:?}, using {}", log_level, LOG_LEVEL);
    }
    Ok(guard)
}
