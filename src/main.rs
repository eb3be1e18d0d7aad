use anyhow::{Context, Result};

use clap::Parser;
use mimalloc::MiMalloc;
use tracing::info;

use offline_shell::{
    application::{
        build_controller, deploy_generation, handle_config_change, initialize_logger,
        shutdown_application, start_server,
    },
    cli::Cli,
    config::Settings,
    utils::start_config_watcher,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = Settings::new(&args.config).with_context(|| "init config failed")?;
    let _guard = initialize_logger(&settings)?;

    let controller = build_controller(&settings)?;
    let handles = start_server(&settings, controller.clone()).await?;
    deploy_generation(controller.clone(), settings.controller.generation.clone());

    // 启动配置文件监听
    let runtime = tokio::runtime::Handle::current();
    let watched_controller = controller.clone();
    let current = settings.clone();
    let stop_tx = start_config_watcher(&args.config, move |result| {
        let _enter = runtime.enter();
        handle_config_change(result, &current, watched_controller.clone());
    })
    .with_context(|| "start config watcher failed")?;

    info!("Server started");

    // 保持主线程运行，直到收到 Ctrl+C
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    shutdown_application(handles, controller, stop_tx).await;

    Ok(())
}
