//! 模拟被调试进程
//!
//! 按配置的内存区域实现 [`DebuggerCore`]，创建断点时保存原始字节并写入 `int3`。

mod symbols;

use std::collections::HashMap;

use core_api::{Breakpoint, CoreError, DebuggerCore};
use nohash_hasher::BuildNoHashHasher;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub use symbols::{Symbol, SymbolTable};

/// 断点指令字节
pub const BREAKPOINT_OPCODE: u8 = 0xCC;

/// 单个内存区域的最大字节数
pub const MAX_REGION_SIZE: u64 = 1 << 30;

type NoHashHashMap<K, V> = HashMap<K, V, BuildNoHashHasher<K>>;

/// 创建目标进程时的错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("内存区域 {name} 大小无效: {size:#x}")]
    BadRegionSize { name: String, size: u64 },
    #[error("内存区域 {name} 超出地址空间: {base:#x} + {size:#x}")]
    RegionOverflow { name: String, base: u64, size: u64 },
    #[error("内存区域 {name} 与 {other} 重叠")]
    RegionOverlap { name: String, other: String },
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// 内存区域配置
#[derive(Deserialize, Debug, Clone)]
pub struct RegionConfig {
    pub name: String,
    pub base: u64,
    pub size: u64,
    #[serde(default = "default_true")]
    pub writable: bool,
    /// 区域初始填充字节
    #[serde(default)]
    pub fill: u8,
}

/// 预置断点配置
#[derive(Deserialize, Debug, Clone)]
pub struct PresetBreakpoint {
    pub address: u64,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub internal: bool,
}

/// 目标进程配置文件（profile/target.toml）
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TargetProfile {
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
    #[serde(default)]
    pub registers: HashMap<String, u64>,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub breakpoints: Vec<PresetBreakpoint>,
}

fn default_true() -> bool {
    true
}

/// 内存区域
#[derive(Debug)]
struct Region {
    name: String,
    base: u64,
    writable: bool,
    data: Vec<u8>,
}

impl Region {
    #[inline(always)]
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.data.len() as u64
    }

    /// 最后一个字节的地址，区域非空
    fn last(&self) -> u64 {
        self.base + (self.data.len() as u64 - 1)
    }
}

/// 模拟目标进程
#[derive(Debug)]
pub struct SimTarget {
    regions: Vec<Region>,
    registers: FxHashMap<String, u64>,
    breakpoints: NoHashHashMap<u64, Breakpoint>,
    attached: bool,
}

impl Default for SimTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTarget {
    /// 创建没有任何内存区域的目标
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            registers: FxHashMap::default(),
            breakpoints: NoHashHashMap::default(),
            attached: true,
        }
    }

    /// 根据配置文件创建目标，并安装预置断点
    pub fn from_profile(profile: &TargetProfile) -> Result<Self, TargetError> {
        let mut target = Self::new();
        for region in &profile.regions {
            target.map_region(&region.name, region.base, region.size, region.writable, region.fill)?;
        }
        for (name, value) in &profile.registers {
            target.set_register(name, *value);
        }
        for preset in &profile.breakpoints {
            if preset.internal {
                target.add_internal_breakpoint(preset.address)?;
            } else {
                target.add_breakpoint(preset.address)?;
            }
            if preset.one_time {
                target.set_one_time(preset.address, true)?;
            }
            if !preset.condition.is_empty() {
                target.set_breakpoint_condition(preset.address, &preset.condition)?;
            }
        }
        Ok(target)
    }

    /// 映射一段内存
    ///
    /// 区域不能为空、不能超过 [`MAX_REGION_SIZE`]、不能越过地址空间末尾，也不能与已有区域重叠
    pub fn map_region(
        &mut self,
        name: &str,
        base: u64,
        size: u64,
        writable: bool,
        fill: u8,
    ) -> Result<(), TargetError> {
        if size == 0 || size > MAX_REGION_SIZE {
            return Err(TargetError::BadRegionSize {
                name: name.to_string(),
                size,
            });
        }
        let last = base.checked_add(size - 1).ok_or_else(|| TargetError::RegionOverflow {
            name: name.to_string(),
            base,
            size,
        })?;
        if let Some(other) = self
            .regions
            .iter()
            .find(|r| r.base <= last && base <= r.last())
        {
            return Err(TargetError::RegionOverlap {
                name: name.to_string(),
                other: other.name.clone(),
            });
        }

        debug!(name, base = format_args!("{:#x}", base), size, writable, "映射内存区域");
        self.regions.push(Region {
            name: name.to_string(),
            base,
            writable,
            data: vec![fill; size as usize],
        });
        Ok(())
    }

    /// 写入内存（忽略写保护，用于初始化）
    pub fn poke(&mut self, addr: u64, bytes: &[u8]) -> Result<(), CoreError> {
        for (i, byte) in bytes.iter().enumerate() {
            let at = addr
                .checked_add(i as u64)
                .ok_or(CoreError::Unmapped { addr })?;
            let region = self.region_mut(at).ok_or(CoreError::Unmapped { addr: at })?;
            let offset = (at - region.base) as usize;
            region.data[offset] = *byte;
        }
        Ok(())
    }

    /// 读取一个字节
    pub fn read_byte(&self, addr: u64) -> Result<u8, CoreError> {
        let region = self
            .regions
            .iter()
            .find(|r| r.contains(addr))
            .ok_or(CoreError::Unmapped { addr })?;
        Ok(region.data[(addr - region.base) as usize])
    }

    /// 地址所在区域名称
    pub fn region_name(&self, addr: u64) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.contains(addr))
            .map(|r| r.name.as_str())
    }

    pub fn set_register(&mut self, name: &str, value: u64) {
        self.registers.insert(name.to_ascii_lowercase(), value);
    }

    /// 创建调试器内部断点
    pub fn add_internal_breakpoint(&mut self, addr: u64) -> Result<(), CoreError> {
        if self.breakpoints.contains_key(&addr) {
            return Ok(());
        }
        let mut bp = self.patch(addr)?;
        bp.internal = true;
        self.breakpoints.insert(addr, bp);
        Ok(())
    }

    /// 设置一次性断点标志
    pub fn set_one_time(&mut self, addr: u64, one_time: bool) -> Result<(), CoreError> {
        let bp = self
            .breakpoints
            .get_mut(&addr)
            .ok_or(CoreError::NoBreakpoint { addr })?;
        bp.one_time = one_time;
        Ok(())
    }

    /// 从进程分离，之后所有断点操作都会失败
    pub fn detach(&mut self) {
        let addrs: Vec<u64> = self.breakpoints.keys().copied().collect();
        for addr in addrs {
            self.remove_breakpoint(addr);
        }
        self.attached = false;
    }

    fn region_mut(&mut self, addr: u64) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(addr))
    }

    /// 写入断点指令，返回记录了原始字节的断点
    fn patch(&mut self, addr: u64) -> Result<Breakpoint, CoreError> {
        if !self.attached {
            return Err(CoreError::NotAttached);
        }
        let region = self.region_mut(addr).ok_or(CoreError::Unmapped { addr })?;
        if !region.writable {
            return Err(CoreError::NotWritable { addr });
        }
        let offset = (addr - region.base) as usize;
        let original = region.data[offset];
        region.data[offset] = BREAKPOINT_OPCODE;
        Ok(Breakpoint::new(addr, original))
    }
}

impl DebuggerCore for SimTarget {
    fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.values().cloned().collect()
    }

    fn find_breakpoint(&self, addr: u64) -> Option<Breakpoint> {
        self.breakpoints.get(&addr).cloned()
    }

    fn add_breakpoint(&mut self, addr: u64) -> Result<Breakpoint, CoreError> {
        if !self.attached {
            return Err(CoreError::NotAttached);
        }
        if let Some(bp) = self.breakpoints.get_mut(&addr) {
            // 内部断点被用户接管，保留原始字节
            bp.internal = false;
            return Ok(bp.clone());
        }
        let bp = self.patch(addr)?;
        self.breakpoints.insert(addr, bp.clone());
        Ok(bp)
    }

    fn remove_breakpoint(&mut self, addr: u64) -> bool {
        let Some(bp) = self.breakpoints.remove(&addr) else {
            return false;
        };
        if let Some(region) = self.region_mut(addr) {
            let offset = (addr - region.base) as usize;
            region.data[offset] = bp.original_byte;
        }
        true
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
        self.registers.get(&name.to_ascii_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_target() -> SimTarget {
        let mut target = SimTarget::new();
        target.map_region("text", 0x40_1000, 0x1000, true, 0x90).unwrap();
        target.map_region("rodata", 0x40_2000, 0x100, false, 0).unwrap();
        target
    }

    #[test]
    fn test_map_region_rejects_bad_layouts() {
        let mut target = create_test_target();
        assert_eq!(
            target.map_region("data", 0x40_1800, 0x1000, true, 0),
            Err(TargetError::RegionOverlap {
                name: "data".to_string(),
                other: "text".to_string()
            })
        );
        assert!(matches!(
            target.map_region("empty", 0x50_0000, 0, true, 0),
            Err(TargetError::BadRegionSize { .. })
        ));
        assert!(matches!(
            target.map_region("huge", 0x50_0000, MAX_REGION_SIZE + 1, true, 0),
            Err(TargetError::BadRegionSize { .. })
        ));
        assert!(matches!(
            target.map_region("wrap", u64::MAX - 0xf, 0x20, true, 0),
            Err(TargetError::RegionOverflow { .. })
        ));

        // 紧邻的区域和地址空间末尾的区域都是合法的
        target.map_region("bss", 0x40_2100, 0x100, true, 0).unwrap();
        target.map_region("top", u64::MAX - 0xf, 0x10, true, 0).unwrap();
        assert_eq!(target.region_name(u64::MAX), Some("top"));
    }

    #[test]
    fn test_poke_at_end_of_address_space() {
        let mut target = SimTarget::new();
        target.map_region("top", u64::MAX - 0xf, 0x10, true, 0).unwrap();
        target.poke(u64::MAX, &[0x55]).unwrap();
        assert_eq!(target.read_byte(u64::MAX).unwrap(), 0x55);
        assert_eq!(
            target.poke(u64::MAX, &[0x55, 0x66]),
            Err(CoreError::Unmapped { addr: u64::MAX })
        );
    }

    #[test]
    fn test_from_profile_rejects_overlap() {
        let region = |name: &str, base| RegionConfig {
            name: name.to_string(),
            base,
            size: 0x100,
            writable: true,
            fill: 0,
        };
        let profile = TargetProfile {
            regions: vec![region("a", 0x1000), region("b", 0x10ff)],
            ..Default::default()
        };
        assert!(matches!(
            SimTarget::from_profile(&profile),
            Err(TargetError::RegionOverlap { .. })
        ));
    }

    #[test]
    fn test_add_breakpoint_patches_memory() {
        let mut target = create_test_target();
        target.poke(0x40_1000, &[0x55]).unwrap();

        let bp = target.add_breakpoint(0x40_1000).unwrap();
        assert_eq!(bp.original_byte, 0x55);
        assert_eq!(target.read_byte(0x40_1000).unwrap(), BREAKPOINT_OPCODE);

        assert!(target.remove_breakpoint(0x40_1000));
        assert_eq!(target.read_byte(0x40_1000).unwrap(), 0x55);
        assert!(!target.remove_breakpoint(0x40_1000));
    }

    #[test]
    fn test_add_breakpoint_is_idempotent() {
        let mut target = create_test_target();
        let first = target.add_breakpoint(0x40_1004).unwrap();
        let second = target.add_breakpoint(0x40_1004).unwrap();
        assert_eq!(first, second);
        assert_eq!(target.breakpoints().len(), 1);
        // 第二次创建不能把 0xCC 当作原始字节
        assert_eq!(second.original_byte, 0x90);
    }

    #[test]
    fn test_add_breakpoint_rejects_bad_addresses() {
        let mut target = create_test_target();
        assert_eq!(
            target.add_breakpoint(0x10),
            Err(CoreError::Unmapped { addr: 0x10 })
        );
        assert_eq!(
            target.add_breakpoint(0x40_2000),
            Err(CoreError::NotWritable { addr: 0x40_2000 })
        );
        assert!(target.breakpoints().is_empty());
    }

    #[test]
    fn test_internal_breakpoint_promotion() {
        let mut target = create_test_target();
        target.add_internal_breakpoint(0x40_1010).unwrap();
        assert!(target.find_breakpoint(0x40_1010).unwrap().internal);

        let bp = target.add_breakpoint(0x40_1010).unwrap();
        assert!(!bp.internal);
        assert_eq!(bp.original_byte, 0x90);
        assert_eq!(target.breakpoints().len(), 1);
    }

    #[test]
    fn test_condition_requires_breakpoint() {
        let mut target = create_test_target();
        assert_eq!(
            target.set_breakpoint_condition(0x40_1000, "rax==1"),
            Err(CoreError::NoBreakpoint { addr: 0x40_1000 })
        );
        target.add_breakpoint(0x40_1000).unwrap();
        target.set_breakpoint_condition(0x40_1000, "rax==1").unwrap();
        assert_eq!(target.breakpoint_condition(0x40_1000).as_deref(), Some("rax==1"));
    }

    #[test]
    fn test_detach() {
        let mut target = create_test_target();
        target.add_breakpoint(0x40_1000).unwrap();
        target.detach();
        assert!(target.breakpoints().is_empty());
        assert_eq!(target.read_byte(0x40_1000).unwrap(), 0x90);
        assert_eq!(target.add_breakpoint(0x40_1000), Err(CoreError::NotAttached));
    }

    #[test]
    fn test_from_profile() {
        let profile = TargetProfile {
            regions: vec![RegionConfig {
                name: "text".to_string(),
                base: 0x1000,
                size: 0x100,
                writable: true,
                fill: 0,
            }],
            registers: HashMap::from([("RIP".to_string(), 0x1000)]),
            symbols: Vec::new(),
            breakpoints: vec![
                PresetBreakpoint {
                    address: 0x1000,
                    condition: "rax==0".to_string(),
                    one_time: true,
                    internal: false,
                },
                PresetBreakpoint {
                    address: 0x1008,
                    condition: String::new(),
                    one_time: false,
                    internal: true,
                },
            ],
        };
        let target = SimTarget::from_profile(&profile).unwrap();
        assert_eq!(target.read_register("rip"), Some(0x1000));

        let bp = target.find_breakpoint(0x1000).unwrap();
        assert!(bp.one_time);
        assert_eq!(bp.condition, "rax==0");
        assert!(target.find_breakpoint(0x1008).unwrap().internal);
        assert_eq!(target.region_name(0x1008), Some("text"));
    }
}
