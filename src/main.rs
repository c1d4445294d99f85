use anyhow::Result;
use bp_manager::{Args, build_manager_run_blocking};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{self, EnvFilter};

fn main() -> Result<()> {
    // 初始化日志，输出到stderr以免混入命令输出
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false) // 不显示目标模块
        .with_file(true) // 显示文件名
        .with_line_number(true) // 显示行号
        .init();

    // 解析命令行参数
    let args = Args::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "启动断点管理器");
    info!(config = %args.config, "配置文件");

    build_manager_run_blocking(args)
}
