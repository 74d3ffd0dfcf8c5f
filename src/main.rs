mod catalogue;
mod config;
mod package_manager;
mod supervisor;
mod tui;

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::time::Duration;

/// 退出时等待阻塞线程池的上限；无法取消的提权命令不会拖住进程
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

async fn run() -> Result<()> {
    // 加载配置
    let config = config::Config::load_or_default()?;

    init_logging(&config)?;

    let catalogue = catalogue::Catalogue::load(config.catalogue.as_deref())?;
    log::info!("已加载 {} 个软件包条目", catalogue.len());

    tui::run(config, catalogue).await?;

    Ok(())
}

/// TUI 占用终端，日志写入文件
fn init_logging(config: &config::Config) -> Result<()> {
    let path = config.log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("无法创建日志目录 {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("无法打开日志文件 {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
