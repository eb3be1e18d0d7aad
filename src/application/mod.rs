use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum_server::Handle;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use url::Url;

use crate::config::Settings;
use crate::consts::{ARCH, COMPILER, NAME, OS, VERSION};
use crate::controller::CacheController;
use crate::http::{Controller, HttpFetcher, make_server, shutdown_servers};
use crate::utils::init_logger;

/// 初始化日志系统，返回的 guard 需要持有到进程结束
pub fn initialize_logger(settings: &Settings) -> Result<WorkerGuard> {
    let guard = init_logger(settings.log_level.as_str(), settings.log_folder.as_str())
        .with_context(|| "Failed to initialize logger")?;
    info!("{} v{}", NAME, VERSION);
    info!("Compiler: {}", COMPILER);
    info!("OS: {} {}", OS, ARCH);
    debug!("Configuration: {:?}", settings);
    Ok(guard)
}

/// 创建控制器，网络超时短于服务器处理超时
pub fn build_controller(settings: &Settings) -> Result<Arc<Controller>> {
    let origin = Url::parse(&settings.controller.origin)
        .with_context(|| format!("invalid origin {}", settings.controller.origin))?;
    let fetcher = HttpFetcher::new(&origin, settings.server.fetch_timeout())
        .with_context(|| "Failed to create http client")?;
    let controller = CacheController::new(&settings.controller, fetcher)
        .with_context(|| "Failed to create cache controller")?;
    Ok(Arc::new(controller))
}

/// 启动服务器实例
pub async fn start_server(
    settings: &Settings,
    controller: Arc<Controller>,
) -> Result<Arc<Mutex<Vec<Handle<SocketAddr>>>>> {
    let handle = make_server(
        settings.server.clone(),
        controller,
        &settings.controller.control_prefix,
    )
    .await?;
    info!(
        "Server instance started on {}:{}",
        settings.server.ip, settings.server.port
    );
    Ok(Arc::new(Mutex::new(vec![handle])))
}

/// 在后台安装并激活一代缓存
pub fn deploy_generation(controller: Arc<Controller>, generation: String) {
    tokio::spawn(async move {
        match controller.update(&generation).await {
            Ok(Some(active)) => info!("Cache generation {} is now active", active),
            Ok(None) => debug!("Cache generation {} not activated", generation),
            Err(err) => error!("Failed to deploy cache generation {}: {}", generation, err),
        }
    });
}

/// 处理配置文件变更，返回是否开始部署新的一代
///
/// 只有 generation 可以在运行时生效；其它字段需要重启。
pub fn handle_config_change(
    result: crate::error::Result<Settings>,
    current: &Settings,
    controller: Arc<Controller>,
) -> bool {
    let new_settings = match result {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to reload config file: {:?}", e);
            return false;
        }
    };
    info!("Config file reloaded successfully");

    if new_settings.server.ip != current.server.ip
        || new_settings.server.port != current.server.port
        || new_settings.controller.origin != current.controller.origin
    {
        warn!("Server address or origin changed, restart to apply");
    }

    let generation = new_settings.controller.generation;
    if controller.registration().is_current(&generation) {
        debug!("Cache generation {} unchanged", generation);
        return false;
    }
    info!("New cache generation {} found, deploying", generation);
    deploy_generation(controller, generation);
    true
}

/// 优雅关闭服务器和配置监听器
pub async fn shutdown_application(
    handles: Arc<Mutex<Vec<Handle<SocketAddr>>>>,
    controller: Arc<Controller>,
    stop_tx: std::sync::mpsc::Sender<()>,
) {
    info!("Received shutdown signal, closing servers...");

    // 优雅关闭所有服务器
    let mut current_handles = handles.lock().await;
    shutdown_servers(&mut current_handles).await;

    // 等待缓存写入
    controller.settle().await;

    // 停止配置监听
    if let Err(err) = stop_tx.send(()) {
        error!("Failed to send stop signal to config watcher: {:?}", err);
    }

    info!("Application shutdown complete");
}
