//! # MotionGen Backend
//!
//! 规划流水线所依赖的外部求解器的窄接口，以及可运行的参考实现。
//!
//! ## 接口
//!
//! - [`Kinematics`]: 正运动学 + 批量逆运动学
//! - [`CollisionWorld`]: 障碍物缓存（load/clear/update）+ 批量碰撞检查
//! - [`GraphSearch`]: 批量离散路径搜索
//! - [`TrajOptimizer`]: 批量轨迹优化
//!
//! 所有批量调用一次处理 N 个候选并返回按下标对齐的 N 个结果；形状不对齐时
//! 返回 [`BackendError::ShapeMismatch`]。
//!
//! ## 参考实现
//!
//! - [`SerialChain`]: 串联机械臂 FK + 阻尼最小二乘 IK（rayon 并行）
//! - [`SphereCollisionWorld`]: 连杆球体 vs OBB 障碍物
//! - [`RrtConnectSearch`]: 基于 `rrt` crate 的双向 RRT-Connect
//! - [`GradientTrajOpt`]: 带线搜索的梯度下降轨迹优化
//!
//! 启用 `mock` feature 后，[`mock`] 模块提供按脚本返回结果并计数的后端。

pub mod collision;
mod error;
pub mod graph;
pub mod kinematics;
pub mod serial_chain;
pub mod trajopt;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use collision::{CollisionWorld, SphereCollisionWorld, SphereModel};
pub use error::BackendError;
pub use graph::{GraphPath, GraphQuery, GraphSearch, RrtConnectSearch, RrtSettings};
pub use kinematics::{IkBatch, IkRequest, Kinematics};
pub use serial_chain::{IkSettings, RevoluteJoint, SerialChain};
pub use trajopt::{
    CostWeights, GradientSettings, GradientTrajOpt, TrajOptBatch, TrajOptRequest, TrajOptimizer,
};
