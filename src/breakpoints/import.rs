//! 断点批量导入导出
//!
//! 文件格式：每行一个十六进制地址。导出的文件可以原样导入。

use std::io::{self, BufRead, Write};

use core_api::{CoreError, DebuggerCore};
use tracing::{debug, warn};

use crate::utils::parse_address;

/// 导入失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// 不是合法的十六进制地址
    InvalidAddress,
    /// 调试器核心拒绝创建断点
    Rejected(CoreError),
}

/// 导入失败的行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// 行内容（含换行符），非 UTF-8 字节写成 `\xNN`
    pub line: String,
    /// 文件中的原始字节
    pub raw: Vec<u8>,
    pub reason: FailureReason,
}

/// 一次导入的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    /// 已存在而跳过的行
    pub skipped: usize,
    /// 按文件顺序排列的失败行
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_lines(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.line.as_str()).collect()
    }

    /// 汇总的错误信息，没有失败时返回 None
    pub fn message(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let mut msg = String::from("The following breakpoints were not made:\n");
        for failure in &self.failures {
            msg.push_str(&failure.line);
        }
        Some(msg)
    }
}

/// 批量导入器
///
/// 每行独立处理，任何一行失败都不会中断导入。
#[derive(Debug, Default)]
pub struct BreakpointBulkImporter {
    report: ImportReport,
}

impl BreakpointBulkImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一行
    pub fn import_line(&mut self, core: &mut dyn DebuggerCore, line: &str) {
        self.import_raw_line(core, line.as_bytes());
    }

    /// 处理一行原始字节
    pub fn import_raw_line(&mut self, core: &mut dyn DebuggerCore, raw: &[u8]) {
        let line = decode_line(raw);
        let Some(address) = parse_address(&line) else {
            debug!(line = line.trim_end(), "无效的断点地址");
            self.report.failures.push(ImportFailure {
                line,
                raw: raw.to_vec(),
                reason: FailureReason::InvalidAddress,
            });
            return;
        };

        // 只和用户断点比较，内部断点照常创建
        if core.find_breakpoint(address).is_some_and(|bp| !bp.internal) {
            debug!(address = format_args!("{:#x}", address), "断点已存在，跳过");
            self.report.skipped += 1;
            return;
        }

        // 直接调用核心接口，不弹出交互式错误
        match core.add_breakpoint(address) {
            Ok(_) => self.report.created += 1,
            Err(e) => {
                warn!(address = format_args!("{:#x}", address), error = %e, "无法创建断点");
                self.report.failures.push(ImportFailure {
                    line,
                    raw: raw.to_vec(),
                    reason: FailureReason::Rejected(e),
                });
            }
        }
    }

    /// 读取整个输入流
    ///
    /// 读取出错时返回错误，已处理的行保持生效
    pub fn import_from_reader<R: BufRead>(
        &mut self,
        core: &mut dyn DebuggerCore,
        mut reader: R,
    ) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            self.import_raw_line(core, &buf);
        }
        Ok(())
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    pub fn finish(self) -> ImportReport {
        self.report
    }
}

/// 按 UTF-8 解码，无效字节保留为 `\xNN`
fn decode_line(raw: &[u8]) -> String {
    let mut line = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        line.push_str(chunk.valid());
        for byte in chunk.invalid() {
            line.push_str(&format!("\\x{:02x}", byte));
        }
    }
    line
}

/// 按地址升序导出用户断点，返回导出的数量
pub fn export_breakpoints<W: Write>(core: &dyn DebuggerCore, mut writer: W) -> io::Result<usize> {
    let mut addrs: Vec<u64> = core
        .breakpoints()
        .into_iter()
        .filter(|bp| !bp.internal)
        .map(|bp| bp.address)
        .collect();
    addrs.sort_unstable();

    for addr in &addrs {
        writeln!(writer, "{:x}", addr)?;
    }
    writer.flush()?;
    Ok(addrs.len())
}
