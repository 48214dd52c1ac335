//! 规划层错误类型定义
//!
//! 规划失败（IK 失败、优化失败等）不是错误，而是 [`PlanStatus`](crate::PlanStatus)；
//! 这里只覆盖配置错误、世界缓存错误和构造阶段的后端错误。

use motiongen_backend::BackendError;
use motiongen_types::{CacheCapacity, TypesError};
use thiserror::Error;

/// 配置校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 数值必须为正（且有限）
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// 计数低于下限
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    /// 时间步长上下限颠倒
    #[error("minimum_trajectory_dt ({min}) exceeds maximum_trajectory_dt ({max})")]
    DtRange { min: f64, max: f64 },

    /// 精调缩放系数小于 1
    #[error("finetune_dt_scale must be >= 1.0, got {0}")]
    DtScale(f64),

    /// 优化和图搜索都被关闭
    #[error("At least one of enable_opt / enable_graph must be set")]
    NoPlanner,
}

/// 世界模型/碰撞缓存错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    /// 预热后的缓存容量不足，需要先 `reallocate_world_cache`
    #[error(
        "World needs {required:?} but the warmed-up collision cache holds {capacity:?}; call reallocate_world_cache first"
    )]
    CacheCapacityExceeded {
        required: CacheCapacity,
        capacity: CacheCapacity,
    },

    /// 其他后端错误
    #[error("Collision backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for WorldError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::CacheCapacityExceeded { required, capacity } => {
                WorldError::CacheCapacityExceeded { required, capacity }
            },
            other => WorldError::Backend(other),
        }
    }
}

/// 规划器构造/预热错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// 世界模型错误
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// 后端错误
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// 值类型错误
    #[error("Types error: {0}")]
    Types(#[from] TypesError),

    /// Builder 缺少后端
    #[error("Missing backend: {0}")]
    MissingBackend(&'static str),
}
