//! ELF符号加载

use anyhow::{Context, Result};
use object::{Object, ObjectSymbol, SymbolKind};
use sim_target::Symbol;
use std::fs;
use tracing::debug;

/// 从ELF文件中读取函数符号
pub fn load_elf_symbols(path: &str) -> Result<Vec<Symbol>> {
    // 读取ELF文件
    let elf_data = fs::read(path)
        .with_context(|| format!("无法读取ELF文件 '{}'", path))?;
    let elf_file = object::File::parse(&*elf_data)
        .with_context(|| format!("无法解析ELF文件 '{}'", path))?;

    // 静态符号表为空时退回动态符号表
    let mut symbols: Vec<Symbol> = function_symbols(elf_file.symbols());
    if symbols.is_empty() {
        symbols = function_symbols(elf_file.dynamic_symbols());
    }

    debug!(path, count = symbols.len(), "加载ELF符号");
    Ok(symbols)
}

fn function_symbols<'data, S>(iter: impl Iterator<Item = S>) -> Vec<Symbol>
where
    S: ObjectSymbol<'data>,
{
    iter.filter(|sym| sym.kind() == SymbolKind::Text && sym.is_definition())
        .filter_map(|sym| {
            let name = sym.name().ok()?;
            if name.is_empty() {
                return None;
            }
            Some(Symbol {
                name: name.to_string(),
                address: sym.address(),
                size: sym.size(),
            })
        })
        .collect()
}
