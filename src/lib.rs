//! 调试器断点管理库

pub mod breakpoints;
pub mod const_values;
pub mod expression;
pub mod shell;
pub mod utils;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sim_target::{SimTarget, SymbolTable};
use tracing::info;

use crate::breakpoints::BreakpointManager;
use crate::const_values::BpmConfig;
use crate::expression::HexExpression;
use crate::shell::Shell;

/// 断点管理器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 配置文件地址
    #[arg(short, long, default_value = "profile/config.toml")]
    pub config: String,

    /// 目标进程配置文件，覆盖配置文件中的设置
    #[arg(short, long)]
    pub target: Option<String>,

    /// 提供函数符号的ELF文件
    #[arg(short, long)]
    pub elf: Option<String>,

    /// 从文件读取命令，默认读取标准输入
    #[arg(short, long)]
    pub script: Option<PathBuf>,
}

pub fn build_manager_run_blocking(args: Args) -> Result<()> {
    let config = BpmConfig::new(&args.config)?;

    let profile_path = match &args.target {
        Some(path) => PathBuf::from(path),
        None => config.resolve(&config.target.profile),
    };
    info!(path = %profile_path.display(), "加载目标配置");
    let profile = const_values::load_target_profile(&profile_path)?;

    let target = SimTarget::from_profile(&profile)
        .with_context(|| format!("无法创建目标进程: {}", profile_path.display()))?;

    let mut symbols = SymbolTable::new(profile.symbols.clone());
    if let Some(elf_path) = &args.elf {
        info!(path = %elf_path, "加载ELF符号");
        symbols.extend(utils::load_elf_symbols(elf_path)?);
    }
    info!(count = symbols.len(), "符号表就绪");

    let manager = BreakpointManager::new(
        target,
        Box::new(HexExpression),
        Box::new(symbols),
        config.display.pointer_width,
    );
    let mut shell = Shell::new(manager, config.default_dir());

    let mut stdout = io::stdout().lock();
    shell.print_table(&mut stdout)?;
    match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("无法打开命令文件: {}", path.display()))?;
            shell.run(BufReader::new(file), &mut stdout)
        }
        None => shell.run(io::stdin().lock(), &mut stdout),
    }
}
