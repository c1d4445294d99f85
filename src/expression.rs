//! 地址表达式求值
//!
//! 只支持十六进制数、寄存器名和函数符号的加减，例如 `rip+10`、`main+4`。

use core_api::{AddressEvaluator, DebuggerCore, ExpressionError, SymbolResolver};

use crate::utils::parse_address;

/// 十六进制地址表达式
#[derive(Debug, Default, Clone, Copy)]
pub struct HexExpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
}

impl HexExpression {
    fn term(
        text: &str,
        core: &dyn DebuggerCore,
        symbols: &dyn SymbolResolver,
    ) -> Result<u64, ExpressionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExpressionError::new("缺少操作数"));
        }
        // 十六进制数优先于同名寄存器
        if let Some(value) = parse_address(text) {
            return Ok(value);
        }
        if text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ExpressionError::new(format!("数值溢出: {}", text)));
        }
        if let Some(value) = core.read_register(text) {
            return Ok(value);
        }
        let mut addrs = symbols.symbol_addresses(text);
        addrs.sort_unstable();
        addrs.dedup();
        match addrs.as_slice() {
            [] => Err(ExpressionError::new(format!("未知的寄存器、符号或数值: {}", text))),
            [addr] => Ok(*addr),
            _ => Err(ExpressionError::new(format!("符号不唯一: {}", text))),
        }
    }
}

impl AddressEvaluator for HexExpression {
    fn evaluate_address(
        &self,
        text: &str,
        core: &dyn DebuggerCore,
        symbols: &dyn SymbolResolver,
    ) -> Result<u64, ExpressionError> {
        if text.trim().is_empty() {
            return Err(ExpressionError::new("表达式为空"));
        }

        let mut value: u64 = 0;
        let mut op = Op::Add;
        let mut start = 0;
        let bytes = text.as_bytes();
        for i in 0..=bytes.len() {
            let next = match bytes.get(i) {
                Some(b'+') => Some(Op::Add),
                Some(b'-') => Some(Op::Sub),
                Some(_) => continue,
                None => None,
            };
            let term = Self::term(&text[start..i], core, symbols)?;
            value = match op {
                Op::Add => value.checked_add(term),
                Op::Sub => value.checked_sub(term),
            }
            .ok_or_else(|| ExpressionError::new(format!("地址计算溢出: {}", text.trim())))?;
            if let Some(next) = next {
                op = next;
                start = i + 1;
            }
        }
        Ok(value)
    }
}
