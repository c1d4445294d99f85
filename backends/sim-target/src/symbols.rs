//! 符号表

use core_api::SymbolResolver;
use serde::Deserialize;

/// 函数符号
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    #[serde(default)]
    pub size: u64,
}

impl Symbol {
    fn contains(&self, addr: u64) -> bool {
        if self.size == 0 {
            addr == self.address
        } else {
            addr >= self.address && addr - self.address < self.size
        }
    }
}

/// 按地址排序的符号表
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|s| s.address);
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 合并另一组符号
    pub fn extend(&mut self, symbols: impl IntoIterator<Item = Symbol>) {
        self.symbols.extend(symbols);
        self.symbols.sort_by_key(|s| s.address);
    }
}

impl SymbolResolver for SymbolTable {
    fn find_function_symbol(&self, addr: u64) -> Option<String> {
        // 起始地址不大于 addr 的最后一个符号
        let idx = self.symbols.partition_point(|s| s.address <= addr);
        let symbol = self.symbols[..idx].iter().rev().find(|s| s.contains(addr))?;
        let offset = addr - symbol.address;
        if offset == 0 {
            Some(symbol.name.clone())
        } else {
            Some(format!("{}+{:#x}", symbol.name, offset))
        }
    }

    fn symbol_addresses(&self, name: &str) -> Vec<u64> {
        self.symbols
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.address)
            .collect()
    }
}
