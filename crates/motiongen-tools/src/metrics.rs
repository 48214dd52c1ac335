//! # 规划指标
//!
//! 从 [`PlanResult`] 提取的单次请求指标。起始状态本身不可行的请求
//! （`valid_query = false`）不产生指标，不计入求解器失败。

use motiongen_planner::{PlanResult, PlanStatus};
use serde::{Deserialize, Serialize};

/// 单次规划请求的指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub success: bool,
    pub status: PlanStatus,
    /// 请求总耗时（秒）
    pub time: f64,
    /// 产生结果的那次尝试的耗时（秒）
    pub solve_time: f64,
    /// 末端位置误差（毫米）
    pub position_error: f64,
    /// 末端姿态误差（弧度）
    pub orientation_error: f64,
    /// 消耗的尝试次数
    pub attempts: usize,
    /// 轨迹时长（秒）
    pub motion_time: f64,
    /// 返回的轨迹是否来自图搜索
    pub used_graph: bool,
}

impl PlanMetrics {
    /// 从规划结果提取指标；无效请求返回 `None`
    pub fn from_result(result: &PlanResult) -> Option<Self> {
        if !result.valid_query {
            return None;
        }

        Some(Self {
            success: result.success,
            status: result.status,
            time: result.timings.total_time.as_secs_f64(),
            solve_time: result.timings.solve_time.as_secs_f64(),
            position_error: result.position_error.unwrap_or(f64::INFINITY) * 1000.0,
            orientation_error: result.rotation_error.unwrap_or(f64::INFINITY),
            attempts: result.attempts,
            motion_time: result.motion_time.unwrap_or(0.0),
            used_graph: result.used_graph,
        })
    }
}
