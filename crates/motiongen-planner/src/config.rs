//! 规划器配置
//!
//! - [`MotionGenConfig`]: 构造时确定的设置（批大小、时间步、阈值、缓存容量）。
//!   预热后批量缓冲区的形状依赖这些值，因此构造后不可修改。
//! - [`PlanConfig`]: 每次规划请求的选项，在一次 `plan_single` 调用期间只读。
//!
//! 时间类字段以秒为单位的 `f64` 存储，便于 TOML 读写。

use crate::error::ConfigError;
use motiongen_backend::CostWeights;
use motiongen_types::CacheCapacity;
use std::time::Duration;

/// 规划器构造配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionGenConfig {
    /// IK 批大小
    pub num_ik_seeds: usize,
    /// 图搜索批大小
    pub num_graph_seeds: usize,
    /// 轨迹优化批大小
    pub num_trajopt_seeds: usize,
    /// 轨迹优化路点数
    pub trajopt_tsteps: usize,
    /// 轨迹优化初始时间步长（秒）
    pub trajopt_dt: f64,
    /// 插值输出步长（秒）
    pub interpolation_dt: f64,
    /// 插值输出最大点数
    pub interpolation_steps: usize,
    /// 末端位置阈值（米）
    pub position_threshold: f64,
    /// 末端姿态阈值（弧度）
    pub rotation_threshold: f64,
    /// 碰撞代价激活距离（米）
    pub collision_activation_distance: f64,
    /// 碰撞球额外余量（米）
    pub collision_sphere_buffer: f64,
    /// 精调每次重试的时间步长放大系数
    pub finetune_dt_scale: f64,
    /// 精调重试次数
    pub finetune_attempts: usize,
    /// 时间步长上限（秒）
    pub maximum_trajectory_dt: f64,
    /// 时间步长下限（秒）
    pub minimum_trajectory_dt: f64,
    /// 每次图搜索批量调用的时间预算（秒）
    pub graph_time_budget: f64,
    /// 预热时预留的碰撞缓存容量
    pub collision_cache: CacheCapacity,
    /// 轨迹优化代价权重
    pub cost_weights: CostWeights,
    /// 随机种子（参考后端）
    pub random_seed: u64,
    /// 候选不足时循环重复以填满批大小
    pub use_batch_padding: bool,
}

impl Default for MotionGenConfig {
    fn default() -> Self {
        Self {
            num_ik_seeds: 30,
            num_graph_seeds: 4,
            num_trajopt_seeds: 4,
            trajopt_tsteps: 32,
            trajopt_dt: 0.25,
            interpolation_dt: 0.02,
            interpolation_steps: 2000,
            position_threshold: 0.005,
            rotation_threshold: 0.05,
            collision_activation_distance: 0.03,
            collision_sphere_buffer: 0.0,
            finetune_dt_scale: 1.05,
            finetune_attempts: 3,
            maximum_trajectory_dt: 0.1,
            minimum_trajectory_dt: 0.005,
            graph_time_budget: 1.0,
            collision_cache: CacheCapacity::new(10, 0),
            cost_weights: CostWeights::default(),
            random_seed: 0,
            use_batch_padding: true,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn at_least(field: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, min, value })
    }
}

impl MotionGenConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("num_ik_seeds", 1, self.num_ik_seeds)?;
        at_least("num_graph_seeds", 1, self.num_graph_seeds)?;
        at_least("num_trajopt_seeds", 1, self.num_trajopt_seeds)?;
        at_least("trajopt_tsteps", 3, self.trajopt_tsteps)?;
        at_least("interpolation_steps", 2, self.interpolation_steps)?;
        positive("trajopt_dt", self.trajopt_dt)?;
        positive("interpolation_dt", self.interpolation_dt)?;
        positive("position_threshold", self.position_threshold)?;
        positive("rotation_threshold", self.rotation_threshold)?;
        positive("maximum_trajectory_dt", self.maximum_trajectory_dt)?;
        positive("minimum_trajectory_dt", self.minimum_trajectory_dt)?;
        positive("graph_time_budget", self.graph_time_budget)?;
        if !(self.collision_activation_distance >= 0.0 && self.collision_activation_distance.is_finite()) {
            return Err(ConfigError::NotPositive {
                field: "collision_activation_distance",
                value: self.collision_activation_distance,
            });
        }
        if !self.collision_sphere_buffer.is_finite() {
            return Err(ConfigError::NotPositive {
                field: "collision_sphere_buffer",
                value: self.collision_sphere_buffer,
            });
        }
        if !(self.finetune_dt_scale >= 1.0 && self.finetune_dt_scale.is_finite()) {
            return Err(ConfigError::DtScale(self.finetune_dt_scale));
        }
        if self.minimum_trajectory_dt > self.maximum_trajectory_dt {
            return Err(ConfigError::DtRange {
                min: self.minimum_trajectory_dt,
                max: self.maximum_trajectory_dt,
            });
        }
        Ok(())
    }

    /// 图搜索时间预算
    pub fn graph_budget(&self) -> Duration {
        Duration::from_secs_f64(self.graph_time_budget.max(0.0))
    }

    /// 把时间步长限制在 `[minimum_trajectory_dt, maximum_trajectory_dt]`
    pub fn clamp_dt(&self, dt: f64) -> f64 {
        dt.min(self.maximum_trajectory_dt)
            .max(self.minimum_trajectory_dt)
    }
}

/// 单次规划请求配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlanConfig {
    /// 最大尝试次数
    pub max_attempts: usize,
    /// 是否允许图搜索
    pub enable_graph: bool,
    /// 从第几次尝试（0 起）开始使用图搜索；`None` 表示从第一次开始
    pub enable_graph_attempt: Option<usize>,
    /// 是否运行轨迹优化
    pub enable_opt: bool,
    /// 是否运行精调
    pub enable_finetune_trajopt: bool,
    /// IK 全部不收敛时是否用残差最小的种子继续
    pub partial_ik_opt: bool,
    /// 整个请求的墙钟时间上限（秒）
    pub timeout: f64,
    /// 图搜索失败时是否直接结束本次尝试
    pub need_graph_success: bool,
    /// 覆盖 [`MotionGenConfig::finetune_attempts`]
    pub finetune_attempts: Option<usize>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            enable_graph: false,
            enable_graph_attempt: Some(3),
            enable_opt: true,
            enable_finetune_trajopt: true,
            partial_ik_opt: true,
            timeout: 10.0,
            need_graph_success: false,
            finetune_attempts: None,
        }
    }
}

impl PlanConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("max_attempts", 1, self.max_attempts)?;
        positive("timeout", self.timeout)?;
        if !self.enable_opt && !self.enable_graph {
            return Err(ConfigError::NoPlanner);
        }
        Ok(())
    }

    /// 超时时长
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0))
    }

    /// 第 `attempt` 次尝试（0 起）是否使用图搜索
    ///
    /// 关闭优化时图搜索是唯一的规划手段，从第一次尝试开始使用。
    pub fn uses_graph(&self, attempt: usize) -> bool {
        if !self.enable_graph {
            return false;
        }
        if !self.enable_opt {
            return true;
        }
        attempt >= self.enable_graph_attempt.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MotionGenConfig::default().validate().is_ok());
        assert!(PlanConfig::default().validate().is_ok());
    }

    #[test]
    fn test_motion_gen_config_rejects_bad_values() {
        let config = MotionGenConfig {
            trajopt_tsteps: 2,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooSmall {
                field: "trajopt_tsteps",
                min: 3,
                value: 2
            })
        );

        let config = MotionGenConfig {
            trajopt_dt: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "trajopt_dt",
                ..
            })
        ));

        let config = MotionGenConfig {
            minimum_trajectory_dt: 0.5,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DtRange { min: 0.5, max: 0.1 })
        );

        let config = MotionGenConfig {
            finetune_dt_scale: 0.9,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::DtScale(0.9)));
    }

    #[test]
    fn test_plan_config_validation() {
        let config = PlanConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlanConfig {
            enable_opt: false,
            enable_graph: false,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoPlanner));

        let config = PlanConfig {
            timeout: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uses_graph() {
        let config = PlanConfig::default();
        assert!(!config.uses_graph(10));

        let config = PlanConfig {
            enable_graph: true,
            enable_graph_attempt: Some(2),
            ..Default::default()
        };
        assert!(!config.uses_graph(0));
        assert!(!config.uses_graph(1));
        assert!(config.uses_graph(2));
        assert!(config.uses_graph(5));

        let config = PlanConfig {
            enable_graph: true,
            enable_graph_attempt: None,
            ..Default::default()
        };
        assert!(config.uses_graph(0));

        let graph_only = PlanConfig {
            enable_graph: true,
            enable_opt: false,
            enable_graph_attempt: Some(4),
            ..Default::default()
        };
        assert!(graph_only.uses_graph(0));
    }

    #[test]
    fn test_clamp_dt() {
        let config = MotionGenConfig::default();
        assert_eq!(config.clamp_dt(1.0), 0.1);
        assert_eq!(config.clamp_dt(0.0), 0.005);
        assert_eq!(config.clamp_dt(0.05), 0.05);
    }
}
