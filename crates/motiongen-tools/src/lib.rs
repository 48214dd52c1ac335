//! # MotionGen Tools - 结果统计和配置文件
//!
//! 只依赖规划层的公开类型，不持有规划器。
//!
//! ## 包含模块
//!
//! - `metrics` - 单次规划的指标（纯数据结构）
//! - `statistics` - 分组统计（可选）
//! - `config` - 规划器配置的 TOML 文件读写
//!
//! ## Feature Flags
//!
//! - `default` - 无默认 features
//! - `full` - 启用所有功能（包含 statistics）
//! - `statistics` - 启用分组统计（依赖 `statrs`）

pub mod config;
pub mod metrics;

// 可选模块（通过 feature flags 控制）
#[cfg(feature = "statistics")]
pub mod statistics;

// 重新导出常用类型
pub use config::PlannerConfigFile;
pub use metrics::PlanMetrics;
#[cfg(feature = "statistics")]
pub use statistics::{GroupMetrics, Statistic};
