use anyhow::{self, Context};
use serde::Deserialize;
use sim_target::TargetProfile;
use std::path::{Path, PathBuf};

/// 默认地址显示宽度（64位指针）
pub const DEFAULT_POINTER_WIDTH: usize = 16;

#[derive(Deserialize, Debug, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_pointer_width")]
    pub pointer_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pointer_width: DEFAULT_POINTER_WIDTH,
        }
    }
}

fn default_pointer_width() -> usize {
    DEFAULT_POINTER_WIDTH
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ImportConfig {
    /// 导入导出文件的默认目录
    pub default_dir: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TargetConfig {
    /// 目标进程配置文件路径
    pub profile: String,
}

/// 主配置（profile/config.toml）
#[derive(Deserialize, Debug, Clone)]
pub struct BpmConfig {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub import: ImportConfig,
    pub target: TargetConfig,
    /// 配置文件所在目录，相对路径以此为基准
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl BpmConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<BpmConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        let mut config: BpmConfig = toml::from_str(&toml_str)
            .with_context(|| format!("无法解析主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        config.base_dir = path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        anyhow::Ok(config)
    }

    /// 以配置文件目录为基准解析路径
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// 导入导出文件的默认目录
    pub fn default_dir(&self) -> PathBuf {
        match &self.import.default_dir {
            Some(dir) => self.resolve(dir),
            None => self.base_dir.clone(),
        }
    }
}

/// 读取目标进程配置文件
pub fn load_target_profile(path: impl AsRef<Path>) -> anyhow::Result<TargetProfile> {
    let toml_str = std::fs::read_to_string(&path)
        .with_context(|| format!("无法读取目标配置文件: {:?}", &path.as_ref().as_os_str()))?;
    let profile: TargetProfile = toml::from_str(&toml_str)
        .with_context(|| format!("无法解析目标配置文件: {:?}", &path.as_ref().as_os_str()))?;
    anyhow::Ok(profile)
}
