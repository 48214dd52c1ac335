//! # MotionGen Types
//!
//! 运动生成流水线的值类型（无求解器依赖）
//!
//! ## 模块
//!
//! - `pose`: 笛卡尔位姿（位置 + 单位四元数）及复合/求逆/角距离
//! - `state`: 关节状态与关节限位
//! - `trajectory`: 固定步长关节轨迹、直线种子、路径重采样、三次插值
//! - `world`: 障碍物（长方体/网格）、世界模型与缓存容量
//!
//! ## 生命周期
//!
//! `JointState`/`Pose` 每次调用新建、用完即弃；`WorldModel` 在同一规划器上跨多次
//! 规划请求存活，由调用方显式清空缓存后替换。

mod error;
pub mod pose;
pub mod state;
pub mod trajectory;
pub mod world;

pub use error::TypesError;
pub use pose::Pose;
pub use state::{JointLimits, JointState};
pub use trajectory::{JointTrajectory, joint_distance};
pub use world::{CacheCapacity, Cuboid, Mesh, WorldModel};

// nalgebra 类型在公共 API 中出现，统一从这里导出避免版本不一致
pub use nalgebra::{UnitQuaternion, Vector3};
