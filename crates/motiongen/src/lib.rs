//! MotionGen - 机械臂批量运动生成
//!
//! 给定起始关节状态和目标末端位姿，在尝试预算和截止时间内返回一条
//! 无碰撞、满足关节导数限位的关节轨迹。
//!
//! # 架构设计
//!
//! 本库采用分层架构，从底层到高层：
//!
//! - **类型层** (`types`): 位姿、关节状态、轨迹、世界模型
//! - **后端层** (`backend`): 运动学/碰撞/图搜索/轨迹优化接口与参考实现
//! - **规划层** (`planner`): 状态机编排、配置、结果
//! - **工具层** (`tools`): 指标统计、TOML 配置文件
//!
//! # 快速开始
//!
//! ```no_run
//! use motiongen::prelude::*;
//!
//! motiongen::init_logger();
//! let mut motion_gen = MotionGen::builder()
//!     .reference_robot(SerialChain::demo_arm())
//!     .world(WorldModel::empty())
//!     .build()?;
//! motion_gen.warmup(false)?;
//!
//! let start = motion_gen.retract_state();
//! let goal = Pose::from_translation(0.5, 0.2, 0.6);
//! let result = motion_gen.plan_single(&start, &goal, &PlanConfig::default());
//! if let Some(plan) = result.get_interpolated_plan() {
//!     println!("{} waypoints at {} s", plan.len(), result.interpolation_dt);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use motiongen_backend as backend;
pub use motiongen_planner as planner;
pub use motiongen_tools as tools;
pub use motiongen_types as types;

mod logging;
pub mod prelude;

pub use logging::{init_logger, init_logger_with};

// 规划层（大多数用户使用）
pub use motiongen_planner::{
    MotionGen, MotionGenBuilder, MotionGenConfig, PlanConfig, PlanResult, PlanStatus,
};

// 错误类型
pub use motiongen_backend::BackendError;
pub use motiongen_planner::{ConfigError, PlanError, WorldError};
pub use motiongen_types::TypesError;
