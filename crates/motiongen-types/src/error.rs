//! 值类型层错误定义

use thiserror::Error;

/// 值类型构造/校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypesError {
    /// 关节维度不匹配
    #[error("Joint dimension mismatch: expected {expected}, got {actual}")]
    DofMismatch { expected: usize, actual: usize },

    /// 位姿列表长度错误（需要 [x, y, z, qw, qx, qy, qz]）
    #[error("Invalid pose list length: expected 7, got {0}")]
    InvalidPoseList(usize),

    /// 四元数范数为零，无法归一化
    #[error("Degenerate quaternion (zero norm)")]
    DegenerateQuaternion,

    /// 轨迹为空
    #[error("Trajectory is empty")]
    EmptyTrajectory,

    /// 时间步长非法
    #[error("Invalid time step: {0}")]
    InvalidDt(f64),

    /// 数值包含 NaN/Inf
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
