//! 调试器核心接口定义
//!
//! 断点管理器只通过这里的 trait 访问被调试进程、表达式求值器和符号表，
//! 断点状态始终由调试器核心持有。

use thiserror::Error;

/// 调试器核心错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("地址 {addr:#x} 未映射")]
    Unmapped { addr: u64 },
    #[error("地址 {addr:#x} 不可写")]
    NotWritable { addr: u64 },
    #[error("地址 {addr:#x} 处没有断点")]
    NoBreakpoint { addr: u64 },
    #[error("没有附加的进程")]
    NotAttached,
}

/// 表达式求值错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExpressionError {
    pub message: String,
}

impl ExpressionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 断点信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// 断点地址
    pub address: u64,
    /// 条件表达式，空字符串表示无条件
    pub condition: String,
    /// 被断点指令覆盖的原始字节
    pub original_byte: u8,
    /// 命中一次后自动删除
    pub one_time: bool,
    /// 调试器内部使用的断点（如单步越过）
    pub internal: bool,
}

impl Breakpoint {
    pub fn new(address: u64, original_byte: u8) -> Self {
        Self {
            address,
            condition: String::new(),
            original_byte,
            one_time: false,
            internal: false,
        }
    }
}

/// 调试器核心 trait
/// 断点表的唯一数据源
pub trait DebuggerCore {
    /// 获取全部断点（包含内部断点）
    fn breakpoints(&self) -> Vec<Breakpoint>;

    /// 按地址查找断点
    fn find_breakpoint(&self, addr: u64) -> Option<Breakpoint>;

    /// 在指定地址创建断点
    ///
    /// 地址处已有断点时直接返回已有断点，不会重复创建
    fn add_breakpoint(&mut self, addr: u64) -> Result<Breakpoint, CoreError>;

    /// 删除指定地址的断点
    ///
    /// # 返回
    /// 是否确实删除了一个断点
    fn remove_breakpoint(&mut self, addr: u64) -> bool;

    /// 获取断点条件
    fn breakpoint_condition(&self, addr: u64) -> Option<String> {
        self.find_breakpoint(addr).map(|bp| bp.condition)
    }

    /// 设置断点条件
    fn set_breakpoint_condition(&mut self, addr: u64, condition: &str) -> Result<(), CoreError>;

    /// 读取寄存器（可选，供表达式求值使用）
    fn read_register(&self, _name: &str) -> Option<u64> {
        None
    }
}

/// 地址表达式求值器
pub trait AddressEvaluator {
    /// 根据当前被调试进程状态和符号表求值地址表达式
    fn evaluate_address(
        &self,
        text: &str,
        core: &dyn DebuggerCore,
        symbols: &dyn SymbolResolver,
    ) -> Result<u64, ExpressionError>;
}

/// 符号解析
pub trait SymbolResolver {
    /// 查找包含该地址的函数符号，找不到时返回 None
    fn find_function_symbol(&self, addr: u64) -> Option<String>;

    /// 按名称查找符号地址
    fn symbol_addresses(&self, _name: &str) -> Vec<u64> {
        Vec::new()
    }
}

/// 不提供任何符号的解析器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbols;

impl SymbolResolver for NoSymbols {
    fn find_function_symbol(&self, _addr: u64) -> Option<String> {
        None
    }
}
