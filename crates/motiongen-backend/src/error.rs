//! 后端层错误定义

use motiongen_types::{CacheCapacity, TypesError};
use thiserror::Error;

/// 后端调用错误
///
/// 编排器把这些错误记为对应阶段的失败，不会让它们穿过 `plan` 边界。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// 关节维度不匹配
    #[error("Joint dimension mismatch: expected {expected}, got {actual}")]
    DofMismatch { expected: usize, actual: usize },

    /// 批量输出与请求不对齐
    #[error("Batch shape mismatch in {stage}: expected {expected}, got {actual}")]
    ShapeMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 世界超出碰撞缓存容量
    #[error(
        "Collision cache capacity exceeded: required {required:?}, capacity {capacity:?}"
    )]
    CacheCapacityExceeded {
        required: CacheCapacity,
        capacity: CacheCapacity,
    },

    /// 数值求解失败（矩阵奇异、NaN 等）
    #[error("Numerical failure: {0}")]
    Numerical(String),

    /// 值类型错误
    #[error("Types error: {0}")]
    Types(#[from] TypesError),
}
