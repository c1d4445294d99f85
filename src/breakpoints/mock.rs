//! 测试用的调试器核心和符号表

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use core_api::{Breakpoint, CoreError, DebuggerCore, SymbolResolver};

/// 模拟调试器核心，可指定拒绝创建断点的地址
#[derive(Debug, Default)]
pub struct MockCore {
    breakpoints: HashMap<u64, Breakpoint>,
    rejected: HashSet<u64>,
    registers: HashMap<String, u64>,
    pub add_calls: usize,
    pub snapshot_calls: Cell<usize>,
}

impl MockCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bp: Breakpoint) {
        self.breakpoints.insert(bp.address, bp);
    }

    pub fn insert_internal(&mut self, addr: u64) {
        let mut bp = Breakpoint::new(addr, 0xc3);
        bp.internal = true;
        self.insert(bp);
    }

    pub fn reject(&mut self, addr: u64) {
        self.rejected.insert(addr);
    }

    pub fn set_register(&mut self, name: &str, value: u64) {
        self.registers.insert(name.to_string(), value);
    }

    /// 按地址排序的用户断点地址
    pub fn user_addresses(&self) -> Vec<u64> {
        let mut addrs: Vec<u64> = self
            .breakpoints
            .values()
            .filter(|bp| !bp.internal)
            .map(|bp| bp.address)
            .collect();
        addrs.sort_unstable();
        addrs
    }
}

impl DebuggerCore for MockCore {
    fn breakpoints(&self) -> Vec<Breakpoint> {
        self.snapshot_calls.set(self.snapshot_calls.get() + 1);
        self.breakpoints.values().cloned().collect()
    }

    fn find_breakpoint(&self, addr: u64) -> Option<Breakpoint> {
        self.breakpoints.get(&addr).cloned()
    }

    fn add_breakpoint(&mut self, addr: u64) -> Result<Breakpoint, CoreError> {
        self.add_calls += 1;
        if self.rejected.contains(&addr) {
            return Err(CoreError::Unmapped { addr });
        }
        let bp = self
            .breakpoints
            .entry(addr)
            .or_insert_with(|| Breakpoint::new(addr, 0x90));
        bp.internal = false;
        Ok(bp.clone())
    }

    fn remove_breakpoint(&mut self, addr: u64) -> bool {
        self.breakpoints.remove(&addr).is_some()
    }

    fn set_breakpoint_condition(&mut self, addr: u64, condition: &str) -> Result<(), CoreError> {
        let bp = self
            .breakpoints
            .get_mut(&addr)
            .ok_or(CoreError::NoBreakpoint { addr })?;
        bp.condition = condition.to_string();
        Ok(())
    }

    fn read_register(&self, name: &str) -> Option<u64> {
        self.registers.get(name).copied()
    }
}

/// 模拟符号表，只识别精确地址
#[derive(Debug, Default)]
pub struct MockSymbols {
    symbols: Vec<(u64, String)>,
}

impl MockSymbols {
    pub fn new(symbols: &[(u64, &str)]) -> Self {
        Self {
            symbols: symbols
                .iter()
                .map(|(addr, name)| (*addr, name.to_string()))
                .collect(),
        }
    }
}

impl SymbolResolver for MockSymbols {
    fn find_function_symbol(&self, addr: u64) -> Option<String> {
        self.symbols
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, name)| name.clone())
    }

    fn symbol_addresses(&self, name: &str) -> Vec<u64> {
        self.symbols
            .iter()
            .filter(|(_, n)| n == name)
            .map(|(a, _)| *a)
            .collect()
    }
}
