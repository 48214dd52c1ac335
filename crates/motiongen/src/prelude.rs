//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use motiongen::prelude::*;
//! ```

// 规划层
pub use motiongen_planner::{
    MotionGen, MotionGenBuilder, MotionGenConfig, PlanConfig, PlanResult, PlanStatus,
};

// 值类型
pub use motiongen_types::{
    CacheCapacity, Cuboid, JointLimits, JointState, JointTrajectory, Mesh, Pose, WorldModel,
};

// 后端接口与参考实现
pub use motiongen_backend::{CollisionWorld, GraphSearch, Kinematics, SerialChain, TrajOptimizer};

// 错误类型
pub use motiongen_planner::{PlanError, WorldError};
