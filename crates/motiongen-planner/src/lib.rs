//! # MotionGen Planner
//!
//! 运动生成编排层：在尝试预算和墙钟截止时间内，把批量 IK、图搜索、
//! 轨迹优化和精调串成一条流水线，返回一个带状态的 [`PlanResult`]。
//!
//! ## 快速开始
//!
//! ```no_run
//! use motiongen_backend::SerialChain;
//! use motiongen_planner::{MotionGen, MotionGenConfig, PlanConfig};
//!
//! let mut motion_gen = MotionGen::builder()
//!     .config(MotionGenConfig::default())
//!     .reference_robot(SerialChain::demo_arm())
//!     .build()?;
//! motion_gen.warmup(false)?;
//!
//! let start = motion_gen.retract_state();
//! let goal = motion_gen
//!     .kinematics()
//!     .forward(&start.position)?
//!     .translated([0.0, 0.05, -0.03].into());
//! let result = motion_gen.plan_single(&start, &goal, &PlanConfig::default());
//! println!("{}: {:?}", result.status, result.motion_time);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## 模块
//!
//! - `config`: 构造配置 [`MotionGenConfig`] 与请求配置 [`PlanConfig`]
//! - `motion_gen`: 编排器 [`MotionGen`] 及其 Builder
//! - `result`: [`PlanResult`]、[`PlanStatus`] 与每次尝试的调试记录
//! - `stages`: 各阶段的批量调用与结果整理（内部）

mod config;
mod error;
mod motion_gen;
mod result;
mod stages;

pub use config::{MotionGenConfig, PlanConfig};
pub use error::{ConfigError, PlanError, WorldError};
pub use motion_gen::{MotionGen, MotionGenBuilder};
pub use result::{AttemptRecord, PlanResult, PlanStatus, PlanTimings, Strategy};
