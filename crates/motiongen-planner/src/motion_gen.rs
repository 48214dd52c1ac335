//! 运动生成编排器
//!
//! `MotionGen` 独占四个后端和碰撞缓存，按尝试预算和截止时间驱动状态机：
//!
//! ```text
//! Start → Ik → { Graph | DirectSeed } → TrajOpt → Finetune → Done
//!          ↑ 复用缓存的 IK 解时跳过
//! ```
//!
//! - IK 无收敛解且 `partial_ik_opt = false`：整个请求立即以 `IkFail` 结束
//! - 图搜索只在 `enable_graph` 时使用，从第 `enable_graph_attempt` 次尝试开始
//! - 图搜索失败且 `need_graph_success = false`：同一次尝试内退回直线种子
//! - 截止时间在每次状态转移前检查；正在执行的批量调用不可中断
//!
//! 一次请求内的可变状态（缓存的 IK 解、最后一次失败、最优误差）只存在于
//! `plan_single` 的栈上；规划器本身在请求之间只保存预热标志。

use crate::config::{MotionGenConfig, PlanConfig};
use crate::error::{PlanError, WorldError};
use crate::result::{AttemptRecord, PlanResult, PlanStatus, PlanTimings, Strategy};
use crate::stages::finetune;
use crate::stages::graph;
use crate::stages::ik::{self, IkSeeds};
use crate::stages::trajopt::{self, Candidate};
use crate::stages::StageContext;
use motiongen_backend::{
    CollisionWorld, GradientTrajOpt, GraphSearch, Kinematics, RrtConnectSearch, RrtSettings,
    SerialChain, SphereCollisionWorld, SphereModel, TrajOptimizer,
};
use motiongen_types::{CacheCapacity, JointState, JointTrajectory, Pose, WorldModel};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 状态机状态
enum PlanState {
    /// 决定是否复用 IK 解
    Start,
    Ik,
    Graph(IkSeeds),
    DirectSeed(IkSeeds),
    TrajOpt {
        seeds: Vec<JointTrajectory>,
        used_graph: bool,
    },
    Finetune {
        candidate: Candidate,
        optimized_dt: f64,
        used_graph: bool,
    },
    Done(AttemptEnd),
}

/// 一次尝试的结局
enum AttemptEnd {
    Solved(Box<Solution>),
    /// 本次尝试失败，可以继续下一次
    Failed(PlanStatus),
    /// 整个请求终止
    Abort(PlanStatus),
    TimedOut,
}

/// 成功的规划
struct Solution {
    trajectory: JointTrajectory,
    interpolated: JointTrajectory,
    dt: f64,
    position_error: f64,
    rotation_error: f64,
    used_graph: bool,
}

/// 一次请求内由编排器持有的状态
struct RequestState {
    deadline: Instant,
    cached_ik: Option<IkSeeds>,
    last_failure: Option<PlanStatus>,
    best_effort: Option<(f64, f64)>,
}

impl RequestState {
    fn fail(&mut self, status: PlanStatus) -> PlanState {
        self.last_failure = Some(status);
        PlanState::Done(AttemptEnd::Failed(status))
    }

    fn record_effort(&mut self, effort: Option<(f64, f64)>) {
        if let Some((p, r)) = effort {
            let better = self
                .best_effort
                .is_none_or(|(bp, br)| p + r < bp + br);
            if better {
                self.best_effort = Some((p, r));
            }
        }
    }
}

/// 运动生成器
///
/// 不支持多个调用方并发使用：所有操作取 `&mut self`。
pub struct MotionGen {
    config: MotionGenConfig,
    kinematics: Arc<dyn Kinematics>,
    world: Box<dyn CollisionWorld>,
    graph: Box<dyn GraphSearch>,
    trajopt: Box<dyn TrajOptimizer>,
    warmed_up: bool,
}

impl std::fmt::Debug for MotionGen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionGen")
            .field("config", &self.config)
            .field("dof", &self.kinematics.dof())
            .field("warmed_up", &self.warmed_up)
            .finish()
    }
}

impl MotionGen {
    /// 创建 Builder
    pub fn builder() -> MotionGenBuilder {
        MotionGenBuilder::new()
    }

    pub fn config(&self) -> &MotionGenConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &dyn Kinematics {
        &*self.kinematics
    }

    pub fn world(&self) -> &dyn CollisionWorld {
        &*self.world
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// 当前碰撞缓存容量
    pub fn world_capacity(&self) -> CacheCapacity {
        self.world.capacity()
    }

    /// 收回位形的关节状态
    pub fn retract_state(&self) -> JointState {
        JointState::from_position(
            self.kinematics.joint_names().to_vec(),
            self.kinematics.retract_config().to_vec(),
        )
    }

    /// 预热：规划一次「收回位形 → 收回位形的 FK」，然后按 `collision_cache`
    /// （不小于当前容量）预留并锁定碰撞缓存
    ///
    /// 预热之后 `update_world` 不再扩容。
    pub fn warmup(&mut self, enable_graph: bool) -> Result<PlanResult, PlanError> {
        info!(enable_graph, "Warming up motion generator");
        let start = self.retract_state();
        let goal = self.kinematics.forward(&start.position)?;
        let plan = PlanConfig {
            max_attempts: 1,
            enable_graph,
            enable_graph_attempt: None,
            ..Default::default()
        };
        let result = self.plan_single(&start, &goal, &plan);
        if !result.success {
            warn!(status = %result.status, "Warm-up plan did not succeed");
        }

        let capacity = self.config.collision_cache.max(self.world.capacity());
        self.world.reserve(capacity)?;
        self.warmed_up = true;
        info!(capacity = ?self.world.capacity(), "Warm-up complete");
        Ok(result)
    }

    /// 替换障碍物
    ///
    /// 预热前可以扩容；预热后超出容量时返回
    /// [`WorldError::CacheCapacityExceeded`]。
    pub fn update_world(&mut self, world: &WorldModel) -> Result<(), WorldError> {
        if self.warmed_up {
            self.world.update(world)?;
        } else {
            self.world.load(world)?;
        }
        debug!(obstacles = world.len(), "World updated");
        Ok(())
    }

    /// 清空障碍物缓存（容量不变）
    pub fn clear_world_cache(&mut self) {
        self.world.clear_cache();
        debug!("World cache cleared");
    }

    /// 重新分配碰撞缓存，之后需要重新预热
    pub fn reallocate_world_cache(&mut self, capacity: CacheCapacity) -> Result<(), WorldError> {
        self.world.reserve(capacity)?;
        self.warmed_up = false;
        info!(capacity = ?self.world.capacity(), "Collision cache reallocated");
        Ok(())
    }

    /// 重置；`reset_seed` 为真时重置所有随机后端的种子
    pub fn reset(&mut self, reset_seed: bool) {
        if reset_seed {
            self.kinematics.reset_seed();
            self.graph.reset_seed();
        }
        debug!(reset_seed, "Motion generator reset");
    }

    /// 规划一条从 `start` 到末端位姿 `goal` 的轨迹
    ///
    /// 总是返回结果；失败通过 [`PlanResult::status`] 表示。
    pub fn plan_single(&mut self, start: &JointState, goal: &Pose, plan: &PlanConfig) -> PlanResult {
        let began = Instant::now();
        let interpolation_dt = self.config.interpolation_dt;

        if let Err(e) = plan.validate() {
            warn!(error = %e, "Rejected plan config");
            let mut result = PlanResult::failure(PlanStatus::InvalidConfig, true, interpolation_dt);
            result.timings.total_time = began.elapsed();
            return result;
        }

        if !goal.is_finite() {
            warn!("Rejected non-finite goal pose");
            let mut result = PlanResult::failure(PlanStatus::InvalidConfig, true, interpolation_dt);
            result.timings.total_time = began.elapsed();
            return result;
        }

        let start_q = match self.check_query(start) {
            Ok(q) => q,
            Err(reason) => {
                warn!(reason, "Invalid planning query");
                let mut result = PlanResult::failure(PlanStatus::InvalidQuery, false, interpolation_dt);
                result.timings.total_time = began.elapsed();
                return result;
            },
        };

        let mut request = RequestState {
            deadline: began + plan.timeout_duration(),
            cached_ik: None,
            last_failure: None,
            best_effort: None,
        };
        let mut timings = PlanTimings::default();
        let mut debug_records = Vec::new();
        let mut solution = None;
        let mut timed_out = false;
        let mut graph_attempted = false;

        for index in 0..plan.max_attempts {
            if Instant::now() >= request.deadline {
                timed_out = true;
                break;
            }

            let (record, end) = self.run_attempt(&mut request, index, &start_q, goal, plan);
            debug!(
                attempt = index,
                strategy = ?record.strategy,
                status = %record.status,
                "Attempt finished"
            );
            graph_attempted |= record.strategy != Strategy::Direct;
            timings.accumulate(&record);
            timings.solve_time = record.attempt_time;
            debug_records.push(record);

            match end {
                AttemptEnd::Solved(s) => {
                    solution = Some(s);
                    break;
                },
                AttemptEnd::Failed(_) => {},
                AttemptEnd::Abort(_) => break,
                AttemptEnd::TimedOut => {
                    timed_out = true;
                    break;
                },
            }
        }

        let status = match (&solution, request.last_failure) {
            (Some(_), _) => PlanStatus::Success,
            (None, Some(failure)) => failure,
            (None, None) => PlanStatus::Timeout,
        };

        let mut result = PlanResult::failure(status, true, interpolation_dt);
        result.attempts = debug_records.len();
        result.debug = debug_records;
        result.used_graph = graph_attempted;
        match solution {
            Some(s) => {
                result.success = true;
                result.used_graph = s.used_graph;
                result.motion_time = Some(s.trajectory.motion_time());
                result.optimized_dt = Some(s.dt);
                result.interpolation_dt = s.interpolated.dt;
                result.position_error = Some(s.position_error);
                result.rotation_error = Some(s.rotation_error);
                result.optimized_plan = Some(s.trajectory);
                result.interpolated_plan = Some(s.interpolated);
            },
            None => {
                result.position_error = request.best_effort.map(|e| e.0);
                result.rotation_error = request.best_effort.map(|e| e.1);
            },
        }
        timings.total_time = began.elapsed();
        result.timings = timings;

        info!(
            status = %result.status,
            attempts = result.attempts,
            timed_out,
            total_ms = result.timings.total_time.as_secs_f64() * 1e3,
            "Planning request finished"
        );
        result
    }

    /// 起始状态检查；返回按后端关节顺序排列的位置
    fn check_query(&self, start: &JointState) -> Result<Vec<f64>, &'static str> {
        let dof = self.kinematics.dof();
        if start.check_dof(dof).is_err() {
            return Err("start state has wrong dimension");
        }
        if !start.is_finite() {
            return Err("non-finite start state");
        }
        let q = self.ordered_position(start)?;
        if !self.kinematics.joint_limits().contains(&q) {
            return Err("start state violates joint limits");
        }
        let colliding = self.world.is_in_collision(std::slice::from_ref(&q));
        if colliding.first().copied().unwrap_or(true) {
            return Err("start state in collision");
        }
        Ok(q)
    }

    /// 按名称把关节位置重排为后端顺序（无名称时按原顺序）
    fn ordered_position(&self, start: &JointState) -> Result<Vec<f64>, &'static str> {
        let names = self.kinematics.joint_names();
        if start.joint_names.is_empty() || start.joint_names.as_slice() == names {
            return Ok(start.position.clone());
        }
        names
            .iter()
            .map(|name| {
                start
                    .joint_names
                    .iter()
                    .position(|n| n == name)
                    .map(|i| start.position[i])
                    .ok_or("start state joint names do not match robot")
            })
            .collect()
    }

    fn run_attempt(
        &self,
        request: &mut RequestState,
        index: usize,
        start: &[f64],
        goal: &Pose,
        plan: &PlanConfig,
    ) -> (AttemptRecord, AttemptEnd) {
        let began = Instant::now();
        let ctx = StageContext {
            config: &self.config,
            kinematics: &*self.kinematics,
            world: &*self.world,
        };
        let use_graph = plan.uses_graph(index);
        let strategy = match (use_graph, plan.enable_opt) {
            (false, _) => Strategy::Direct,
            (true, true) => Strategy::Graph,
            (true, false) => Strategy::GraphOnly,
        };
        let mut record = AttemptRecord::new(index, strategy);
        let mut graph_failed = false;
        let mut state = PlanState::Start;

        let end = loop {
            if let PlanState::Done(end) = state {
                break end;
            }
            if Instant::now() >= request.deadline {
                break AttemptEnd::TimedOut;
            }

            state = match state {
                PlanState::Start => match (&request.cached_ik, use_graph) {
                    (Some(seeds), true) if seeds.converged > 0 => {
                        record.reused_ik = true;
                        record.ik_converged = seeds.converged;
                        PlanState::Graph(seeds.clone())
                    },
                    _ => PlanState::Ik,
                },

                PlanState::Ik => {
                    let t = Instant::now();
                    let solved = ik::solve(&ctx, start, goal, plan.partial_ik_opt);
                    record.ik_time += t.elapsed();
                    match solved {
                        Ok(Some(seeds)) => {
                            record.ik_converged = seeds.converged;
                            // 未收敛的种子不缓存，下次尝试重新求解
                            if seeds.converged > 0 {
                                request.cached_ik = Some(seeds.clone());
                            }
                            if use_graph {
                                PlanState::Graph(seeds)
                            } else {
                                PlanState::DirectSeed(seeds)
                            }
                        },
                        outcome => {
                            if let Err(e) = outcome {
                                warn!(error = %e, "IK backend failure");
                            }
                            request.last_failure = Some(PlanStatus::IkFail);
                            if plan.partial_ik_opt {
                                PlanState::Done(AttemptEnd::Failed(PlanStatus::IkFail))
                            } else {
                                PlanState::Done(AttemptEnd::Abort(PlanStatus::IkFail))
                            }
                        },
                    }
                },

                PlanState::Graph(seeds) => {
                    let t = Instant::now();
                    let searched = graph::search(
                        &ctx,
                        &*self.graph,
                        start,
                        &seeds.goals,
                        request.deadline,
                    );
                    record.graph_time += t.elapsed();
                    match searched {
                        Ok(found) if found.found() > 0 => {
                            record.graph_paths = found.found();
                            if plan.enable_opt {
                                PlanState::TrajOpt {
                                    seeds: found.seeds,
                                    used_graph: true,
                                }
                            } else {
                                self.finish_graph_only(request, &ctx, found.seeds, goal)
                            }
                        },
                        outcome => {
                            if let Err(e) = outcome {
                                warn!(error = %e, "Graph backend failure");
                            }
                            graph_failed = true;
                            request.last_failure = Some(PlanStatus::GraphFail);
                            if plan.enable_opt && !plan.need_graph_success {
                                PlanState::DirectSeed(seeds)
                            } else {
                                PlanState::Done(AttemptEnd::Failed(PlanStatus::GraphFail))
                            }
                        },
                    }
                },

                PlanState::DirectSeed(seeds) => match trajopt::direct_seeds(&ctx, start, &seeds.goals) {
                    Ok(seeds) => PlanState::TrajOpt {
                        seeds,
                        used_graph: false,
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to build straight-line seeds");
                        request.fail(PlanStatus::OptimizationFail)
                    },
                },

                PlanState::TrajOpt { seeds, used_graph } => {
                    let t = Instant::now();
                    let optimized = trajopt::optimize(
                        &ctx,
                        &*self.trajopt,
                        &seeds,
                        goal,
                        self.config.trajopt_dt,
                        false,
                    );
                    record.trajopt_time += t.elapsed();
                    // 图搜索失败后的直线兜底也失败时，归因于图搜索
                    let fail_status = if graph_failed {
                        PlanStatus::GraphFail
                    } else {
                        PlanStatus::OptimizationFail
                    };
                    match optimized {
                        Ok(outcome) => {
                            request.record_effort(outcome.best_effort);
                            match outcome.best {
                                Some(candidate) => {
                                    record.trajopt_cost = Some(candidate.cost);
                                    let optimized_dt = self.optimized_dt(&candidate.trajectory);
                                    if plan.enable_finetune_trajopt {
                                        PlanState::Finetune {
                                            candidate,
                                            optimized_dt,
                                            used_graph,
                                        }
                                    } else if self.within_tolerance(&candidate) {
                                        self.finish(
                                            request,
                                            &ctx,
                                            candidate,
                                            optimized_dt,
                                            used_graph,
                                            PlanStatus::OptimizationFail,
                                        )
                                    } else {
                                        request.fail(PlanStatus::OptimizationFail)
                                    }
                                },
                                None => request.fail(fail_status),
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "Trajectory optimizer failure");
                            request.fail(fail_status)
                        },
                    }
                },

                PlanState::Finetune {
                    candidate,
                    optimized_dt,
                    used_graph,
                } => {
                    let attempts = plan
                        .finetune_attempts
                        .unwrap_or(self.config.finetune_attempts);
                    let t = Instant::now();
                    let tuned = finetune::finetune(
                        &ctx,
                        &*self.trajopt,
                        &candidate,
                        goal,
                        optimized_dt,
                        attempts,
                        request.deadline,
                    );
                    record.finetune_time += t.elapsed();
                    match tuned {
                        Ok(outcome) => {
                            if outcome.retries > 0 {
                                record.finetune_dt = Some(outcome.dt);
                            }
                            match outcome.candidate {
                                Some(tuned) => self.finish(
                                    request,
                                    &ctx,
                                    tuned,
                                    outcome.dt,
                                    used_graph,
                                    PlanStatus::FinetuneFail,
                                ),
                                None if self.within_tolerance(&candidate) => self.finish(
                                    request,
                                    &ctx,
                                    candidate,
                                    optimized_dt,
                                    used_graph,
                                    PlanStatus::FinetuneFail,
                                ),
                                None => request.fail(PlanStatus::FinetuneFail),
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "Finetune optimizer failure");
                            request.fail(PlanStatus::FinetuneFail)
                        },
                    }
                },

                PlanState::Done(end) => PlanState::Done(end),
            };
        };

        record.status = match &end {
            AttemptEnd::Solved(_) => PlanStatus::Success,
            AttemptEnd::Failed(status) | AttemptEnd::Abort(status) => *status,
            AttemptEnd::TimedOut => PlanStatus::Timeout,
        };
        record.attempt_time = began.elapsed();
        (record, end)
    }

    /// 满足关节导数限位的最小时间步长（不小于 `minimum_trajectory_dt`）
    fn optimized_dt(&self, trajectory: &JointTrajectory) -> f64 {
        trajectory
            .min_feasible_dt(self.kinematics.joint_limits())
            .max(self.config.minimum_trajectory_dt)
    }

    fn within_tolerance(&self, candidate: &Candidate) -> bool {
        candidate.within(self.config.position_threshold, self.config.rotation_threshold)
    }

    /// 以 `dt`（不小于导数限位要求）重新计时、插值并对插值结果做最终碰撞检查
    fn finish(
        &self,
        request: &mut RequestState,
        ctx: &StageContext<'_>,
        candidate: Candidate,
        dt: f64,
        used_graph: bool,
        fail_status: PlanStatus,
    ) -> PlanState {
        // 精调可能改变路点，重新保证导数限位
        let dt = dt.max(self.optimized_dt(&candidate.trajectory));
        let retimed = candidate.trajectory.with_dt(dt).and_then(|t| {
            let interpolated = t.interpolate(self.config.interpolation_dt, self.config.interpolation_steps)?;
            Ok((t, interpolated))
        });
        let (trajectory, interpolated) = match retimed {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to retime trajectory");
                return request.fail(fail_status);
            },
        };

        if ctx
            .world
            .is_in_collision(&interpolated.position)
            .into_iter()
            .any(|c| c)
        {
            debug!("Interpolated trajectory in collision");
            return request.fail(fail_status);
        }

        PlanState::Done(AttemptEnd::Solved(Box::new(Solution {
            trajectory,
            interpolated,
            dt,
            position_error: candidate.position_error,
            rotation_error: candidate.rotation_error,
            used_graph,
        })))
    }

    /// 只用图搜索：第一条路径即结果，末端误差由正运动学计算
    fn finish_graph_only(
        &self,
        request: &mut RequestState,
        ctx: &StageContext<'_>,
        seeds: Vec<JointTrajectory>,
        goal: &Pose,
    ) -> PlanState {
        let Some(path) = seeds.into_iter().next() else {
            return request.fail(PlanStatus::GraphFail);
        };
        let (position_error, rotation_error) = match self.kinematics.forward(path.last_position()) {
            Ok(pose) => pose.distance(goal),
            Err(e) => {
                warn!(error = %e, "Forward kinematics failed on graph path");
                return request.fail(PlanStatus::GraphFail);
            },
        };
        request.record_effort(Some((position_error, rotation_error)));

        let candidate = Candidate {
            trajectory: path,
            cost: 0.0,
            position_error,
            rotation_error,
        };
        if !self.within_tolerance(&candidate) {
            return request.fail(PlanStatus::IkFail);
        }
        let dt = self.optimized_dt(&candidate.trajectory);
        self.finish(request, ctx, candidate, dt, true, PlanStatus::GraphFail)
    }
}

/// MotionGen Builder（链式构造）
///
/// # Example
///
/// ```
/// use motiongen_backend::SerialChain;
/// use motiongen_planner::{MotionGen, MotionGenConfig};
///
/// let motion_gen = MotionGen::builder()
///     .config(MotionGenConfig::default())
///     .reference_robot(SerialChain::demo_arm())
///     .build()
///     .unwrap();
/// assert_eq!(motion_gen.kinematics().dof(), 6);
/// ```
#[derive(Default)]
pub struct MotionGenBuilder {
    config: Option<MotionGenConfig>,
    reference_robot: Option<SerialChain>,
    kinematics: Option<Arc<dyn Kinematics>>,
    world: Option<Box<dyn CollisionWorld>>,
    graph: Option<Box<dyn GraphSearch>>,
    trajopt: Option<Box<dyn TrajOptimizer>>,
    world_model: Option<WorldModel>,
}

impl MotionGenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置构造配置（默认 [`MotionGenConfig::default`]）
    pub fn config(mut self, config: MotionGenConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 用参考后端（串联链 + 球体碰撞 + RRT-Connect + 梯度优化）填充未显式设置的后端
    pub fn reference_robot(mut self, robot: SerialChain) -> Self {
        self.reference_robot = Some(robot);
        self
    }

    pub fn kinematics(mut self, kinematics: Arc<dyn Kinematics>) -> Self {
        self.kinematics = Some(kinematics);
        self
    }

    pub fn collision_world(mut self, world: Box<dyn CollisionWorld>) -> Self {
        self.world = Some(world);
        self
    }

    pub fn graph_search(mut self, graph: Box<dyn GraphSearch>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn trajopt(mut self, trajopt: Box<dyn TrajOptimizer>) -> Self {
        self.trajopt = Some(trajopt);
        self
    }

    /// 初始世界模型
    pub fn world(mut self, world: WorldModel) -> Self {
        self.world_model = Some(world);
        self
    }

    pub fn build(self) -> Result<MotionGen, PlanError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut kinematics = self.kinematics;
        let mut world = self.world;
        let mut graph = self.graph;
        let mut trajopt = self.trajopt;

        if let Some(robot) = self.reference_robot {
            let robot = Arc::new(robot.with_seed(config.random_seed));
            if world.is_none() {
                let model = SphereModel {
                    activation_distance: config.collision_activation_distance,
                    buffer: config.collision_sphere_buffer,
                    ..Default::default()
                };
                world = Some(Box::new(SphereCollisionWorld::new(robot.clone(), model)));
            }
            if graph.is_none() {
                graph = Some(Box::new(
                    RrtConnectSearch::new(robot.joint_limits().clone(), RrtSettings::default())
                        .with_seed(config.random_seed),
                ));
            }
            if trajopt.is_none() {
                trajopt = Some(Box::new(GradientTrajOpt::default()));
            }
            if kinematics.is_none() {
                kinematics = Some(robot);
            }
        }

        let kinematics = kinematics.ok_or(PlanError::MissingBackend("kinematics"))?;
        let mut world = world.ok_or(PlanError::MissingBackend("collision world"))?;
        let graph = graph.ok_or(PlanError::MissingBackend("graph search"))?;
        let trajopt = trajopt.ok_or(PlanError::MissingBackend("trajectory optimizer"))?;

        let dof = kinematics.dof();
        for actual in [
            kinematics.joint_names().len(),
            kinematics.joint_limits().dof(),
            kinematics.retract_config().len(),
        ] {
            if actual != dof {
                return Err(motiongen_backend::BackendError::DofMismatch {
                    expected: dof,
                    actual,
                }
                .into());
            }
        }

        world.reserve(config.collision_cache)?;
        if let Some(model) = &self.world_model {
            world.load(model)?;
        }

        info!(
            dof,
            ik_seeds = config.num_ik_seeds,
            trajopt_seeds = config.num_trajopt_seeds,
            tsteps = config.trajopt_tsteps,
            "Motion generator built"
        );
        Ok(MotionGen {
            config,
            kinematics,
            world,
            graph,
            trajopt,
            warmed_up: false,
        })
    }
}
