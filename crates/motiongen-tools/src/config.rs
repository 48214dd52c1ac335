//! # 配置文件
//!
//! 把构造配置和默认请求配置保存在同一个 TOML 文件中：
//!
//! ```toml
//! [motion_gen]
//! num_ik_seeds = 30
//! trajopt_tsteps = 32
//!
//! [plan]
//! max_attempts = 10
//! enable_graph = true
//! ```
//!
//! 缺省的字段取默认值；读取后立即校验。

use anyhow::{Context, Result};
use motiongen_planner::{MotionGenConfig, PlanConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 规划器配置文件
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfigFile {
    pub motion_gen: MotionGenConfig,
    pub plan: PlanConfig,
}

impl PlannerConfigFile {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).context("Failed to parse planner config")?;
        file.motion_gen
            .validate()
            .context("Invalid [motion_gen] section")?;
        file.plan.validate().context("Invalid [plan] section")?;
        Ok(file)
    }

    /// 序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize planner config")
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In config file {}", path.display()))
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }
}
