//! 断点列表视图
//!
//! 视图只是调试器核心断点表的投影：每次刷新都整体重建，不缓存任何断点状态。

use std::cmp::Ordering;

use core_api::{Breakpoint, DebuggerCore, SymbolResolver};
use tracing::trace;

use crate::utils::{format_bytes, format_pointer};

/// 表格列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Address,
    Condition,
    OriginalByte,
    Type,
    Function,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Address,
        Column::Condition,
        Column::OriginalByte,
        Column::Type,
        Column::Function,
    ];

    /// 按列序号获取列
    pub fn from_index(index: usize) -> Option<Column> {
        Self::ALL.get(index).copied()
    }

    /// 按名称获取列（不区分大小写）
    pub fn from_name(name: &str) -> Option<Column> {
        match name.to_ascii_lowercase().as_str() {
            "address" | "addr" => Some(Column::Address),
            "condition" | "cond" => Some(Column::Condition),
            "byte" | "original" | "original_byte" => Some(Column::OriginalByte),
            "type" | "kind" => Some(Column::Type),
            "function" | "func" | "symbol" => Some(Column::Function),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Column::Address => "Address",
            Column::Condition => "Condition",
            Column::OriginalByte => "Original Byte",
            Column::Type => "Type",
            Column::Function => "Function",
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// 表格中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRow {
    /// 排序与操作使用的地址键
    pub address: u64,
    pub address_text: String,
    pub condition: String,
    pub original_byte_text: String,
    pub kind_text: &'static str,
    /// 所在函数，解析失败时为空
    pub symbol: String,
}

impl BreakpointRow {
    fn new(bp: &Breakpoint, symbols: &dyn SymbolResolver, pointer_width: usize) -> Self {
        Self {
            address: bp.address,
            address_text: format_pointer(bp.address, pointer_width),
            condition: bp.condition.clone(),
            original_byte_text: format_bytes(&[bp.original_byte]),
            kind_text: if bp.one_time { "One Time" } else { "Standard" },
            symbol: symbols.find_function_symbol(bp.address).unwrap_or_default(),
        }
    }

    /// 指定列的显示文本
    pub fn text(&self, column: Column) -> &str {
        match column {
            Column::Address => &self.address_text,
            Column::Condition => &self.condition,
            Column::OriginalByte => &self.original_byte_text,
            Column::Type => self.kind_text,
            Column::Function => &self.symbol,
        }
    }

    fn compare(&self, other: &Self, column: Column) -> Ordering {
        match column {
            Column::Address => self.address.cmp(&other.address),
            _ => self.text(column).cmp(other.text(column)),
        }
    }
}

/// 双击单元格对应的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellAction {
    /// 在反汇编窗口中跳转到地址
    JumpTo(u64),
    /// 编辑断点条件，`current` 为当前条件
    EditCondition { address: u64, current: String },
}

/// 断点列表视图
#[derive(Debug)]
pub struct BreakpointListView {
    rows: Vec<BreakpointRow>,
    sort_column: Column,
    sort_order: SortOrder,
    pointer_width: usize,
    generation: u64,
}

impl BreakpointListView {
    pub fn new(pointer_width: usize) -> Self {
        Self {
            rows: Vec::new(),
            sort_column: Column::Address,
            sort_order: SortOrder::Ascending,
            pointer_width,
            generation: 0,
        }
    }

    /// 从调试器核心重建整个表格
    ///
    /// 内部断点不显示。符号解析失败时函数列为空，本操作不会失败。
    pub fn refresh(&mut self, core: &dyn DebuggerCore, symbols: &dyn SymbolResolver) {
        let mut snapshot = core.breakpoints();
        snapshot.retain(|bp| !bp.internal);
        // 核心返回顺序不确定，先按地址排好，列排序相等时保持地址顺序
        snapshot.sort_by_key(|bp| bp.address);

        self.rows = snapshot
            .iter()
            .map(|bp| BreakpointRow::new(bp, symbols, self.pointer_width))
            .collect();
        self.sort_rows();
        self.generation += 1;
        trace!(rows = self.rows.len(), generation = self.generation, "刷新断点列表");
    }

    /// 修改排序列和方向
    pub fn sort_by(&mut self, column: Column, order: SortOrder) {
        self.sort_column = column;
        self.sort_order = order;
        self.sort_rows();
    }

    fn sort_rows(&mut self) {
        let column = self.sort_column;
        match self.sort_order {
            SortOrder::Ascending => self.rows.sort_by(|a, b| a.compare(b, column)),
            SortOrder::Descending => self.rows.sort_by(|a, b| b.compare(a, column)),
        }
    }

    pub fn sort_column(&self) -> (Column, SortOrder) {
        (self.sort_column, self.sort_order)
    }

    pub fn rows(&self) -> &[BreakpointRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&BreakpointRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 刷新次数
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pointer_width(&self) -> usize {
        self.pointer_width
    }

    /// 双击单元格
    pub fn activate(&self, row: usize, column: Column) -> Option<CellAction> {
        let row = self.rows.get(row)?;
        match column {
            Column::Address => Some(CellAction::JumpTo(row.address)),
            Column::Condition => Some(CellAction::EditCondition {
                address: row.address,
                current: row.condition.clone(),
            }),
            _ => None,
        }
    }
}
