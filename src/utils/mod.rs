//! 工具模块

mod elf;
mod format;

pub use elf::load_elf_symbols;
pub use format::{format_bytes, format_pointer, parse_address};
