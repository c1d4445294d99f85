//! 断点管理

mod import;
#[cfg(test)]
pub(crate) mod mock;
mod view;

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use core_api::{AddressEvaluator, CoreError, DebuggerCore, ExpressionError, SymbolResolver};
use thiserror::Error;
use tracing::{info, warn};

pub use import::{
    BreakpointBulkImporter, FailureReason, ImportFailure, ImportReport, export_breakpoints,
};
pub use view::{BreakpointListView, BreakpointRow, CellAction, Column, SortOrder};

/// 断点管理错误类型
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("地址表达式错误: {0}")]
    Expression(#[from] ExpressionError),
    #[error("调试器核心错误: {0}")]
    Core(#[from] CoreError),
    #[error("地址 {0:#x} 处没有断点")]
    NoBreakpoint(u64),
    #[error("第 {0} 行不存在")]
    NoSelection(usize),
    #[error("无法打开断点文件: {}", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("读写断点文件失败: {0}")]
    Io(#[from] io::Error),
    /// 读取中途出错，`report` 记录出错前已处理的行
    #[error("导入中断: {source}")]
    ImportAborted {
        report: ImportReport,
        #[source]
        source: io::Error,
    },
}

/// 断点管理器
///
/// 断点状态只保存在调试器核心中，每次修改后重建列表视图。
pub struct BreakpointManager<C: DebuggerCore> {
    core: C,
    evaluator: Box<dyn AddressEvaluator>,
    symbols: Box<dyn SymbolResolver>,
    view: BreakpointListView,
}

impl<C: DebuggerCore> BreakpointManager<C> {
    /// 创建断点管理器并刷新一次列表
    pub fn new(
        core: C,
        evaluator: Box<dyn AddressEvaluator>,
        symbols: Box<dyn SymbolResolver>,
        pointer_width: usize,
    ) -> Self {
        let mut manager = Self {
            core,
            evaluator,
            symbols,
            view: BreakpointListView::new(pointer_width),
        };
        manager.refresh();
        manager
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn view(&self) -> &BreakpointListView {
        &self.view
    }

    /// 重建列表视图
    pub fn refresh(&mut self) {
        self.view.refresh(&self.core, self.symbols.as_ref());
    }

    pub fn sort_by(&mut self, column: Column, order: SortOrder) {
        self.view.sort_by(column, order);
    }

    pub fn activate(&self, row: usize, column: Column) -> Option<CellAction> {
        self.view.activate(row, column)
    }

    /// 用户可见的断点
    fn user_breakpoint_exists(&self, address: u64) -> bool {
        self.core
            .find_breakpoint(address)
            .is_some_and(|bp| !bp.internal)
    }

    /// 按地址表达式添加断点，返回断点地址
    ///
    /// 地址处已有断点时不重复创建，也不报错
    pub fn add(&mut self, expression: &str) -> Result<u64, ManagerError> {
        let address = self
            .evaluator
            .evaluate_address(expression, &self.core, self.symbols.as_ref())?;
        self.core.add_breakpoint(address)?;
        info!(address = format_args!("{:#x}", address), expression, "添加断点");
        self.refresh();
        Ok(address)
    }

    /// 在同名函数的所有地址上添加断点，返回成功的数量
    pub fn add_on_function(&mut self, name: &str) -> usize {
        let mut count = 0;
        for address in self.symbols.symbol_addresses(name) {
            match self.core.add_breakpoint(address) {
                Ok(_) => count += 1,
                Err(e) => warn!(function = name, address = format_args!("{:#x}", address), error = %e, "无法在函数上添加断点"),
            }
        }
        info!(function = name, count, "按函数名添加断点");
        self.refresh();
        count
    }

    /// 删除断点，地址处没有用户断点时不做任何修改
    ///
    /// 无论是否删除都会刷新列表
    pub fn remove(&mut self, address: u64) -> bool {
        let removed = self.user_breakpoint_exists(address) && self.core.remove_breakpoint(address);
        if removed {
            info!(address = format_args!("{:#x}", address), "删除断点");
        }
        self.refresh();
        removed
    }

    /// 删除列表中第 `index` 行的断点
    pub fn remove_row(&mut self, index: usize) -> bool {
        match self.view.row(index).map(|row| row.address) {
            Some(address) => self.remove(address),
            None => {
                self.refresh();
                false
            }
        }
    }

    /// 当前条件，用于预填编辑框
    pub fn condition(&self, address: u64) -> Option<String> {
        if !self.user_breakpoint_exists(address) {
            return None;
        }
        self.core.breakpoint_condition(address)
    }

    /// 覆盖断点条件，不检查表达式是否合法
    ///
    /// 地址处没有用户断点时返回 [`ManagerError::NoBreakpoint`]，断点表保持不变
    pub fn set_condition(&mut self, address: u64, condition: &str) -> Result<(), ManagerError> {
        if !self.user_breakpoint_exists(address) {
            return Err(ManagerError::NoBreakpoint(address));
        }
        self.core.set_breakpoint_condition(address, condition)?;
        info!(address = format_args!("{:#x}", address), condition, "设置断点条件");
        self.refresh();
        Ok(())
    }

    /// 设置列表中第 `index` 行断点的条件
    pub fn set_condition_row(&mut self, index: usize, condition: &str) -> Result<(), ManagerError> {
        let address = self
            .view
            .row(index)
            .map(|row| row.address)
            .ok_or(ManagerError::NoSelection(index))?;
        self.set_condition(address, condition)
    }

    /// 从文件导入断点，`None` 表示用户取消了文件选择
    pub fn import(&mut self, choice: Option<&Path>) -> Result<Option<ImportReport>, ManagerError> {
        let Some(path) = choice else {
            info!("取消导入");
            return Ok(None);
        };
        let file = File::open(path).map_err(|source| ManagerError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "导入断点文件");
        self.import_from_reader(BufReader::new(file)).map(Some)
    }

    /// 从输入流导入断点
    ///
    /// 整个导入过程结束后只刷新一次列表，读取出错时也会刷新，
    /// 并在 `ImportAborted` 中带回已处理部分的结果
    pub fn import_from_reader<R: io::BufRead>(&mut self, reader: R) -> Result<ImportReport, ManagerError> {
        let mut importer = BreakpointBulkImporter::new();
        let result = importer.import_from_reader(&mut self.core, reader);
        self.refresh();

        let report = importer.finish();
        if let Err(source) = result {
            warn!(
                created = report.created,
                skipped = report.skipped,
                failed = report.failures.len(),
                error = %source,
                "导入中断"
            );
            return Err(ManagerError::ImportAborted { report, source });
        }
        if report.is_clean() {
            info!(created = report.created, skipped = report.skipped, "导入完成");
        } else {
            warn!(
                created = report.created,
                skipped = report.skipped,
                failed = report.failures.len(),
                "导入完成，部分断点未创建"
            );
        }
        Ok(report)
    }

    /// 导出用户断点到文件，返回导出数量；`None` 表示用户取消
    pub fn export(&self, choice: Option<&Path>) -> Result<Option<usize>, ManagerError> {
        let Some(path) = choice else {
            info!("取消导出");
            return Ok(None);
        };
        let file = File::create(path).map_err(|source| ManagerError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let count = export_breakpoints(&self.core, BufWriter::new(file))?;
        info!(path = %path.display(), count, "导出断点文件");
        Ok(Some(count))
    }
}
