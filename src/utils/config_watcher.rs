use notify::{
    EventKind, RecursiveMode, Watcher,
    event::{AccessKind, AccessMode},
};
use std::{
    path::Path,
    sync::mpsc,
    time::{Duration, Instant},
};
use tracing::{debug, error, info};

use crate::{config::Settings, error::Result};

/// 启动配置文件监听
///
/// # 参数
///
/// * `config_path` - 配置文件路径
/// * `callback` - 配置文件变化时的回调函数，参数为重新解析的配置
///
/// # 返回值
///
/// 返回一个发送器，用于发送停止信号
pub fn start_config_watcher(
    config_path: impl AsRef<Path>,
    callback: impl Fn(Result<Settings>) + Send + 'static,
) -> Result<mpsc::Sender<()>> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let config_path = config_path.as_ref().to_owned();

    // 在当前线程创建 watcher，路径错误可以直接返回
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
    info!("Watching config file: {:?}", config_path);

    std::thread::spawn(move || {
        let debounce_duration = Duration::from_millis(500);
        // 最后一次事件之后安静 debounce_duration 才重新加载
        let mut reload_at: Option<Instant> = None;
        let mut rewatch = false;

        loop {
            // 检查是否有停止信号
            if stop_rx.try_recv().is_ok() {
                info!("Stopping config watcher");
                break;
            }

            let wait = reload_at
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(1));
            match rx.recv_timeout(wait) {
                // 重新加载时读取文件也会产生事件
                Ok(Ok(event)) if is_read_only(&event.kind) => continue,
                Ok(Ok(event)) => {
                    debug!("Config file event: {:?}", event);
                    // 文件被删除或重命名（编辑器覆盖写入）后需要重新 watch
                    if let EventKind::Remove(_)
                    | EventKind::Modify(notify::event::ModifyKind::Name(_)) = event.kind
                    {
                        rewatch = true;
                    }
                    reload_at = Some(Instant::now() + debounce_duration);
                }
                Ok(Err(e)) => error!("Watch error: {:?}", e),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watcher channel disconnected");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if reload_at.is_none_or(|at| Instant::now() < at) {
                        continue;
                    }
                    reload_at = None;

                    if rewatch {
                        rewatch = false;
                        if let Err(e) = watcher.unwatch(&config_path) {
                            debug!("Failed to unwatch config file (ignored): {:?}", e);
                        }
                        if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
                            error!("Failed to re-watch config file: {:?}", e);
                        } else {
                            info!("Re-watching config file: {:?}", config_path);
                        }
                    }

                    info!("Config file changed, reloading");
                    match config_path.to_str() {
                        Some(path) => callback(Settings::new(path)),
                        None => error!("Config path is not valid utf-8: {:?}", config_path),
                    }
                }
            }
        }

        if let Err(e) = watcher.unwatch(&config_path) {
            error!("Failed to unwatch config file: {:?}", e);
        }
    });

    Ok(stop_tx)
}

fn is_read_only(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Access(access) if *access != AccessKind::Close(AccessMode::Write))
}
