//! 交互式命令行

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use core_api::DebuggerCore;
use tracing::{debug, info};

use crate::breakpoints::{
    BreakpointManager, CellAction, Column, ImportReport, ManagerError, SortOrder,
};
use crate::utils::{format_pointer, parse_address};

/// 一行命令
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// 列出断点
    #[command(alias = "ls")]
    List,
    /// 按地址表达式添加断点
    Add {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
        expression: Vec<String>,
    },
    /// 删除断点（地址或 #行号）
    #[command(alias = "rm")]
    Remove { target: String },
    /// 查看或设置断点条件（地址或 #行号）
    Cond {
        target: String,
        #[arg(num_args = 0.., allow_hyphen_values = true, trailing_var_arg = true)]
        expression: Vec<String>,
    },
    /// 清除断点条件（地址或 #行号）
    Uncond { target: String },
    /// 在函数上添加断点
    Func { name: String },
    /// 从文件导入断点，不带路径视为取消
    Import { path: Option<PathBuf> },
    /// 导出断点到文件，不带路径视为取消
    Export { path: Option<PathBuf> },
    /// 按列排序
    Sort {
        column: String,
        #[arg(default_value = "asc")]
        order: String,
    },
    /// 双击单元格
    Open { row: usize, column: usize },
    /// 退出
    #[command(alias = "exit")]
    Quit,
}

/// 断点的指定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Row(usize),
    Address(u64),
}

impl Target {
    fn parse(text: &str) -> Option<Target> {
        match text.strip_prefix('#') {
            Some(row) => row.parse().ok().map(Target::Row),
            None => parse_address(text).map(Target::Address),
        }
    }
}

/// 命令行中跳过前 `skip` 个单词后的原文，保留表达式内部的空白
///
/// `parsed` 为空时表示命令没有带这部分参数
fn raw_args<'a>(line: &'a str, skip: usize, parsed: &[String]) -> &'a str {
    if parsed.is_empty() {
        return "";
    }
    let mut rest = line.trim_start();
    for _ in 0..skip {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

/// 命令执行后的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// 命令行会话
pub struct Shell<C: DebuggerCore> {
    manager: BreakpointManager<C>,
    /// 导入导出相对路径的基准目录
    base_dir: PathBuf,
}

impl<C: DebuggerCore> Shell<C> {
    pub fn new(manager: BreakpointManager<C>, base_dir: PathBuf) -> Self {
        Self { manager, base_dir }
    }

    pub fn manager(&self) -> &BreakpointManager<C> {
        &self.manager
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// 逐行执行输入中的命令，直到 `quit` 或输入结束
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            if self.execute(&line, out)? == Flow::Quit {
                break;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// 执行一行命令，命令本身的错误输出后继续
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words[0].starts_with("//") {
            return Ok(Flow::Continue);
        }
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(out, "{}", e.render())?;
                return Ok(Flow::Continue);
            }
        };
        debug!(command = ?parsed.command, "执行命令");

        let result = match parsed.command {
            ShellCommand::Quit => return Ok(Flow::Quit),
            ShellCommand::List => self.print_table(out).map_err(ManagerError::from),
            ShellCommand::Add { expression } => self.add(raw_args(line, 1, &expression), out),
            ShellCommand::Remove { target } => self.remove(&target, out),
            ShellCommand::Cond { target, expression } => {
                self.condition(&target, raw_args(line, 2, &expression), out)
            }
            ShellCommand::Uncond { target } => self
                .resolve_target(&target)
                .and_then(|address| self.manager.set_condition(address, "")),
            ShellCommand::Func { name } => {
                let count = self.manager.add_on_function(&name);
                writeln!(out, "在 {} 上添加了 {} 个断点", name, count)?;
                Ok(())
            }
            ShellCommand::Import { path } => self.import(path.as_deref(), out),
            ShellCommand::Export { path } => self.export(path.as_deref(), out),
            ShellCommand::Sort { column, order } => self.sort(&column, &order, out),
            ShellCommand::Open { row, column } => self.open(row, column, out),
        };

        if let Err(e) = result {
            writeln!(out, "{} {}", "错误:".red().bold(), e)?;
        }
        Ok(Flow::Continue)
    }

    fn resolve_target(&self, text: &str) -> Result<u64, ManagerError> {
        match Target::parse(text) {
            Some(Target::Row(row)) => self
                .manager
                .view()
                .row(row)
                .map(|r| r.address)
                .ok_or(ManagerError::NoSelection(row)),
            Some(Target::Address(addr)) => Ok(addr),
            None => Err(ManagerError::Expression(core_api::ExpressionError::new(format!(
                "无效的地址: {}",
                text
            )))),
        }
    }

    fn add<W: Write>(&mut self, expression: &str, out: &mut W) -> Result<(), ManagerError> {
        let address = self.manager.add(expression)?;
        writeln!(out, "断点: {}", self.pointer(address))?;
        Ok(())
    }

    fn remove<W: Write>(&mut self, target: &str, out: &mut W) -> Result<(), ManagerError> {
        let removed = match Target::parse(target) {
            Some(Target::Row(row)) => self.manager.remove_row(row),
            Some(Target::Address(addr)) => self.manager.remove(addr),
            None => return self.resolve_target(target).map(|_| ()),
        };
        if !removed {
            writeln!(out, "没有删除任何断点")?;
        }
        Ok(())
    }

    fn condition<W: Write>(
        &mut self,
        target: &str,
        expression: &str,
        out: &mut W,
    ) -> Result<(), ManagerError> {
        let address = self.resolve_target(target)?;
        if expression.is_empty() {
            let current = self
                .manager
                .condition(address)
                .ok_or(ManagerError::NoBreakpoint(address))?;
            writeln!(out, "{}: {}", self.pointer(address), current)?;
            return Ok(());
        }
        self.manager.set_condition(address, expression)
    }

    fn import<W: Write>(&mut self, path: Option<&Path>, out: &mut W) -> Result<(), ManagerError> {
        let path = path.map(|p| self.resolve(p));
        match self.manager.import(path.as_deref()) {
            Ok(Some(report)) => Self::print_report(&report, out)?,
            Ok(None) => writeln!(out, "已取消")?,
            // 中断前已处理的行仍然生效，先报告它们
            Err(ManagerError::ImportAborted { report, source }) => {
                Self::print_report(&report, out)?;
                return Err(ManagerError::Io(source));
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn print_report<W: Write>(report: &ImportReport, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "创建 {} 个，跳过 {} 个",
            report.created.to_string().green(),
            report.skipped
        )?;
        if let Some(msg) = report.message() {
            write!(out, "{}", msg.yellow())?;
            if !msg.ends_with('\n') {
                writeln!(out)?;
            }
        }
        Ok(())
    }

    fn export<W: Write>(&self, path: Option<&Path>, out: &mut W) -> Result<(), ManagerError> {
        let path = path.map(|p| self.resolve(p));
        match self.manager.export(path.as_deref())? {
            Some(count) => writeln!(out, "导出 {} 个断点", count)?,
            None => writeln!(out, "已取消")?,
        }
        Ok(())
    }

    fn sort<W: Write>(&mut self, column: &str, order: &str, out: &mut W) -> Result<(), ManagerError> {
        let Some(column) = Column::from_name(column) else {
            writeln!(out, "未知的列: {}", column)?;
            return Ok(());
        };
        let order = if order.eq_ignore_ascii_case("desc") {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        self.manager.sort_by(column, order);
        self.print_table(out)?;
        Ok(())
    }

    fn open<W: Write>(&mut self, row: usize, column: usize, out: &mut W) -> Result<(), ManagerError> {
        let action = Column::from_index(column).and_then(|c| self.manager.activate(row, c));
        match action {
            Some(CellAction::JumpTo(address)) => {
                info!(address = format_args!("{:#x}", address), "跳转到地址");
                writeln!(out, "跳转到 {}", self.pointer(address))?;
            }
            Some(CellAction::EditCondition { address, current }) => {
                writeln!(
                    out,
                    "条件 {}: {} (使用 cond #{} <表达式> 修改)",
                    self.pointer(address),
                    current,
                    row
                )?;
            }
            None => {}
        }
        Ok(())
    }

    fn pointer(&self, address: u64) -> String {
        format_pointer(address, self.manager.view().pointer_width())
    }

    /// 打印断点表
    pub fn print_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let view = self.manager.view();
        let width = view.pointer_width().max(Column::Address.title().len());
        writeln!(
            out,
            "{}",
            format!(
                "{:>3}  {:<width$}  {:<16}  {:<4}  {:<8}  {}",
                "#",
                Column::Address.title(),
                Column::Condition.title(),
                "Byte",
                Column::Type.title(),
                Column::Function.title(),
                width = width
            )
            .bold()
        )?;
        for (i, row) in view.rows().iter().enumerate() {
            writeln!(
                out,
                "{:>3}  {:<width$}  {:<16}  {:<4}  {:<8}  {}",
                i,
                row.address_text.cyan(),
                row.condition,
                row.original_byte_text,
                row.kind_text,
                row.symbol,
                width = width
            )?;
        }
        if view.is_empty() {
            writeln!(out, "(没有断点)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::mock::MockCore;
    use crate::expression::HexExpression;
    use core_api::NoSymbols;

    fn create_test_shell() -> Shell<MockCore> {
        colored::control::set_override(false);
        let mut core = MockCore::new();
        core.set_register("rip", 0x401000);
        core.reject(0x10);
        let manager = BreakpointManager::new(core, Box::new(HexExpression), Box::new(NoSymbols), 8);
        Shell::new(manager, std::env::temp_dir())
    }

    fn exec(shell: &mut Shell<MockCore>, line: &str) -> String {
        let mut out = Vec::new();
        shell.execute(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse("#2"), Some(Target::Row(2)));
        assert_eq!(Target::parse("0x401000"), Some(Target::Address(0x401000)));
        assert_eq!(Target::parse("#x"), None);
        assert_eq!(Target::parse("zz"), None);
    }

    #[test]
    fn test_add_list_remove() {
        let mut shell = create_test_shell();
        assert!(exec(&mut shell, "add rip + 4").contains("00401004"));
        assert!(exec(&mut shell, "list").contains("00401004"));

        exec(&mut shell, "remove #0");
        assert!(shell.manager().view().is_empty());
        assert!(exec(&mut shell, "ls").contains("没有断点"));
    }

    #[test]
    fn test_errors_are_reported() {
        let mut shell = create_test_shell();
        assert!(exec(&mut shell, "add 10").contains("错误"));
        assert!(exec(&mut shell, "cond 401000 rax==1").contains("没有断点"));
        assert!(exec(&mut shell, "frobnicate").contains("error"));
        assert_eq!(exec(&mut shell, "   "), "");
    }

    #[test]
    fn test_condition_commands() {
        let mut shell = create_test_shell();
        exec(&mut shell, "add 401000");
        exec(&mut shell, "cond #0 rax == 1");
        assert!(exec(&mut shell, "cond 401000").contains("rax == 1"));
        exec(&mut shell, "uncond #0");
        assert_eq!(shell.manager().condition(0x401000).as_deref(), Some(""));
    }

    #[test]
    fn test_condition_keeps_hyphens_and_spacing() {
        let mut shell = create_test_shell();
        exec(&mut shell, "add 401000");
        assert_eq!(exec(&mut shell, "cond #0 -1 ==  rax"), "");
        assert_eq!(shell.manager().condition(0x401000).as_deref(), Some("-1 ==  rax"));

        exec(&mut shell, "  cond   401000   rax  --x  ");
        assert_eq!(shell.manager().condition(0x401000).as_deref(), Some("rax  --x"));
    }

    #[test]
    fn test_raw_args() {
        let words = vec!["x".to_string()];
        assert_eq!(raw_args("  add  rip  +  4 ", 1, &words), "rip  +  4");
        assert_eq!(raw_args("cond #0\t-1", 2, &words), "-1");
        assert_eq!(raw_args("cond #0", 2, &[]), "");
    }

    #[test]
    fn test_import_export_commands() {
        let mut shell = create_test_shell();
        let name = format!("bpm-shell-{}.txt", std::process::id());
        std::fs::write(std::env::temp_dir().join(&name), "401000\nzz\n10\n").unwrap();

        let output = exec(&mut shell, &format!("import {}", name));
        assert!(output.contains("The following breakpoints were not made:\nzz\n10\n"));
        assert!(exec(&mut shell, "import").contains("已取消"));

        assert!(exec(&mut shell, &format!("export {}", name)).contains("导出 1 个断点"));
        let exported = std::fs::read_to_string(std::env::temp_dir().join(&name)).unwrap();
        std::fs::remove_file(std::env::temp_dir().join(&name)).ok();
        assert_eq!(exported, "401000\n");
    }

    #[test]
    fn test_open_and_sort() {
        let mut shell = create_test_shell();
        exec(&mut shell, "add 1000");
        exec(&mut shell, "add 2000");
        let output = exec(&mut shell, "sort address desc");
        assert!(output.find("00002000").unwrap() < output.find("00001000").unwrap());
        assert!(exec(&mut shell, "open 0 0").contains("跳转到 00002000"));
        assert!(exec(&mut shell, "open 1 1").contains("cond #1"));
        assert!(exec(&mut shell, "sort nope").contains("未知的列"));
    }

    #[test]
    fn test_run_until_quit() {
        let mut shell = create_test_shell();
        let mut out = Vec::new();
        shell
            .run("add 1000\nquit\nadd 2000\n".as_bytes(), &mut out)
            .unwrap();
        assert_eq!(shell.manager().core().user_addresses(), vec![0x1000]);
    }
}
