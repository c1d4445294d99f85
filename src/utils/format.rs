//! 地址与字节格式化

/// 按指针宽度格式化地址，补零到 `width` 位十六进制
pub fn format_pointer(addr: u64, width: usize) -> String {
    format!("{:0width$x}", addr, width = width)
}

/// 字节的十六进制表示
pub fn format_bytes(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// 按十六进制解析地址
///
/// 去掉首尾空白，可带 `0x`/`0X` 前缀；空串、负数和非十六进制字符都视为无效
pub fn parse_address(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
