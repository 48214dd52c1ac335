//! 规划结果
//!
//! 每次 `plan_single` 调用恰好产生一个 [`PlanResult`]；失败也通过状态返回，
//! 并附带每次尝试的调试记录。

use motiongen_types::JointTrajectory;
use std::fmt;
use std::time::Duration;

/// 规划状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlanStatus {
    /// 成功
    Success,
    /// 没有收敛的 IK 解
    IkFail,
    /// 图搜索未找到无碰撞路径
    GraphFail,
    /// 没有收敛的优化轨迹
    OptimizationFail,
    /// 精调后仍未达到末端阈值
    FinetuneFail,
    /// 在任何阶段完成前超时
    Timeout,
    /// 起始状态本身不可行（碰撞、越限、维度错误）
    InvalidQuery,
    /// 请求配置非法
    InvalidConfig,
}

impl PlanStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PlanStatus::Success)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Success => "Success",
            PlanStatus::IkFail => "IK Fail",
            PlanStatus::GraphFail => "Graph Fail",
            PlanStatus::OptimizationFail => "Optimization Fail",
            PlanStatus::FinetuneFail => "Finetuning Fail",
            PlanStatus::Timeout => "Timeout",
            PlanStatus::InvalidQuery => "Invalid Query",
            PlanStatus::InvalidConfig => "Invalid Config",
        };
        write!(f, "{}", s)
    }
}

/// 一次尝试采用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// 直线插值种子 + 轨迹优化
    Direct,
    /// 图搜索路径作为优化种子
    Graph,
    /// 只用图搜索（不优化）
    GraphOnly,
}

/// 各阶段耗时
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanTimings {
    pub ik_time: Duration,
    pub graph_time: Duration,
    pub trajopt_time: Duration,
    pub finetune_time: Duration,
    /// 整个请求耗时（所有尝试之和）
    pub total_time: Duration,
    /// 产生返回轨迹的那次尝试的耗时（无成功时为最后一次尝试）
    pub solve_time: Duration,
}

impl PlanTimings {
    /// 累加一次尝试的各阶段耗时
    pub(crate) fn accumulate(&mut self, record: &AttemptRecord) {
        self.ik_time += record.ik_time;
        self.graph_time += record.graph_time;
        self.trajopt_time += record.trajopt_time;
        self.finetune_time += record.finetune_time;
    }
}

/// 单次尝试的调试记录
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttemptRecord {
    /// 尝试序号（0 起）
    pub index: usize,
    pub strategy: Strategy,
    /// 本次尝试的结果
    pub status: PlanStatus,
    /// 是否复用了之前尝试的 IK 解
    pub reused_ik: bool,
    /// 收敛的 IK 种子数
    pub ik_converged: usize,
    /// 找到的图搜索路径数
    pub graph_paths: usize,
    /// 最优收敛轨迹的代价
    pub trajopt_cost: Option<f64>,
    /// 精调最后使用的时间步长
    pub finetune_dt: Option<f64>,
    pub ik_time: Duration,
    pub graph_time: Duration,
    pub trajopt_time: Duration,
    pub finetune_time: Duration,
    pub attempt_time: Duration,
}

impl AttemptRecord {
    pub(crate) fn new(index: usize, strategy: Strategy) -> Self {
        Self {
            index,
            strategy,
            status: PlanStatus::Timeout,
            reused_ik: false,
            ik_converged: 0,
            graph_paths: 0,
            trajopt_cost: None,
            finetune_dt: None,
            ik_time: Duration::ZERO,
            graph_time: Duration::ZERO,
            trajopt_time: Duration::ZERO,
            finetune_time: Duration::ZERO,
            attempt_time: Duration::ZERO,
        }
    }
}

/// 规划结果
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanResult {
    pub success: bool,
    pub status: PlanStatus,
    /// 起始状态是否可行；为 `false` 时不应计入求解器失败统计
    pub valid_query: bool,
    /// 返回的轨迹是否来自图搜索种子
    pub used_graph: bool,
    /// 消耗的尝试次数
    pub attempts: usize,
    /// 优化后的轨迹（`trajopt_tsteps` 个路点，步长为 `optimized_dt`）
    pub optimized_plan: Option<JointTrajectory>,
    /// 优化后轨迹的时间步长
    pub optimized_dt: Option<f64>,
    /// 按 `interpolation_dt` 插值后的轨迹
    pub interpolated_plan: Option<JointTrajectory>,
    pub interpolation_dt: f64,
    /// 轨迹总时长（秒）
    pub motion_time: Option<f64>,
    /// 末端位置误差（米）
    pub position_error: Option<f64>,
    /// 末端姿态误差（弧度）
    pub rotation_error: Option<f64>,
    pub timings: PlanTimings,
    /// 每次尝试的调试记录
    pub debug: Vec<AttemptRecord>,
}

impl PlanResult {
    /// 失败结果（无轨迹）
    pub(crate) fn failure(status: PlanStatus, valid_query: bool, interpolation_dt: f64) -> Self {
        Self {
            success: false,
            status,
            valid_query,
            used_graph: false,
            attempts: 0,
            optimized_plan: None,
            optimized_dt: None,
            interpolated_plan: None,
            interpolation_dt,
            motion_time: None,
            position_error: None,
            rotation_error: None,
            timings: PlanTimings::default(),
            debug: Vec::new(),
        }
    }

    /// 插值轨迹（成功时）
    pub fn get_interpolated_plan(&self) -> Option<&JointTrajectory> {
        self.interpolated_plan.as_ref()
    }
}
