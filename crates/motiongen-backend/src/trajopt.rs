//! 轨迹优化接口与梯度下降参考实现
//!
//! 一次调用优化整批种子轨迹（rayon 并行，结果按输入顺序对齐）。
//!
//! # 代价
//!
//! ```text
//! J = w_s * Σ‖q[t-1] - 2q[t] + q[t+1]‖²     平滑
//!   + w_c * Σ collision_cost(q[t])           碰撞（激活距离内的穿透）
//!   + w_l * Σ violation(q[t])²               限位
//!   + w_p * (位置误差 + 姿态误差)             末端位姿
//! ```
//!
//! 起点固定；中间路点做带回溯线搜索的梯度下降；末端路点每轮做一步阻尼最小
//! 二乘逼近目标位姿。收敛条件：所有路点（含相邻中点）无碰撞、在限位内，
//! 末端误差在阈值内。

use crate::collision::CollisionWorld;
use crate::error::BackendError;
use crate::kinematics::{Kinematics, dls_step};
use motiongen_types::{JointTrajectory, Pose};
use rayon::prelude::*;
use tracing::trace;

/// 代价权重
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostWeights {
    /// 平滑项（二阶差分）
    pub smoothness: f64,
    /// 碰撞项
    pub collision: f64,
    /// 关节限位项
    pub joint_limit: f64,
    /// 末端位姿项
    pub pose: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            smoothness: 1.0,
            collision: 1000.0,
            joint_limit: 100.0,
            pose: 1.0,
        }
    }
}

/// 批量轨迹优化请求
pub struct TrajOptRequest<'a> {
    /// 种子轨迹
    pub seeds: &'a [JointTrajectory],
    /// 目标末端位姿
    pub goal: Pose,
    /// 代价权重
    pub weights: CostWeights,
    /// 时间步长（秒）
    pub dt: f64,
    /// 路点数
    pub timesteps: usize,
    /// 位置阈值（米）
    pub position_threshold: f64,
    /// 姿态阈值（弧度）
    pub rotation_threshold: f64,
    /// 是否为精调阶段（迭代更多、步长更小）
    pub finetune: bool,
    pub kinematics: &'a dyn Kinematics,
    pub world: &'a dyn CollisionWorld,
}

/// 批量轨迹优化结果（所有字段与种子逐个对齐）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrajOptBatch {
    pub trajectories: Vec<JointTrajectory>,
    pub converged: Vec<bool>,
    pub cost: Vec<f64>,
    pub position_error: Vec<f64>,
    pub rotation_error: Vec<f64>,
}

impl TrajOptBatch {
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// 校验输出形状
    pub fn check_shape(&self, seed_count: usize) -> Result<(), BackendError> {
        for len in [
            self.trajectories.len(),
            self.converged.len(),
            self.cost.len(),
            self.position_error.len(),
            self.rotation_error.len(),
        ] {
            if len != seed_count {
                return Err(BackendError::ShapeMismatch {
                    stage: "trajopt",
                    expected: seed_count,
                    actual: len,
                });
            }
        }
        Ok(())
    }

    /// 代价最低的收敛种子下标
    pub fn best_converged(&self) -> Option<usize> {
        self.converged
            .iter()
            .zip(&self.cost)
            .enumerate()
            .filter(|(_, (converged, _))| **converged)
            .min_by(|(_, (_, a)), (_, (_, b))| a.total_cmp(b))
            .map(|(i, _)| i)
    }

    /// 末端误差最小的种子下标（不论是否收敛）
    pub fn best_effort(&self) -> Option<usize> {
        self.position_error
            .iter()
            .zip(&self.rotation_error)
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.0 + a.1).total_cmp(&(b.0 + b.1)))
            .map(|(i, _)| i)
    }
}

/// 轨迹优化后端
pub trait TrajOptimizer: Send + Sync {
    fn optimize(&self, request: &TrajOptRequest<'_>) -> Result<TrajOptBatch, BackendError>;
}

/// 梯度优化器参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSettings {
    /// 粗优化迭代次数
    pub iterations: usize,
    /// 精调迭代次数
    pub finetune_iterations: usize,
    /// 单次线搜索初始最大关节增量（rad）
    pub max_step: f64,
    /// 精调初始最大关节增量（rad）
    pub finetune_max_step: f64,
    /// 回溯次数
    pub line_search_steps: usize,
    /// 碰撞梯度差分步长
    pub fd_eps: f64,
    /// 末端阻尼最小二乘参数
    pub damping: f64,
    pub terminal_max_step: f64,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            iterations: 60,
            finetune_iterations: 90,
            max_step: 0.05,
            finetune_max_step: 0.02,
            line_search_steps: 8,
            fd_eps: 1e-4,
            damping: 0.05,
            terminal_max_step: 0.1,
        }
    }
}

/// 单个种子的优化结果
struct SeedOutcome {
    trajectory: JointTrajectory,
    converged: bool,
    cost: f64,
    position_error: f64,
    rotation_error: f64,
}

/// 批量梯度下降轨迹优化器
#[derive(Debug, Clone, Default)]
pub struct GradientTrajOpt {
    settings: GradientSettings,
}

impl GradientTrajOpt {
    pub fn new(settings: GradientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GradientSettings {
        &self.settings
    }

    /// 中间路点代价（平滑 + 碰撞 + 限位），不含末端位姿项
    fn path_cost(&self, q: &[Vec<f64>], request: &TrajOptRequest<'_>) -> f64 {
        let w = &request.weights;
        let limits = request.kinematics.joint_limits();

        let smooth: f64 = q
            .windows(3)
            .map(|w3| {
                w3[0]
                    .iter()
                    .zip(&w3[1])
                    .zip(&w3[2])
                    .map(|((a, b), c)| (a - 2.0 * b + c).powi(2))
                    .sum::<f64>()
            })
            .sum();
        let interior = &q[1..q.len() - 1];
        let collision: f64 = interior
            .iter()
            .map(|p| request.world.collision_cost(p))
            .sum();
        let limit: f64 = interior.iter().map(|p| limits.violation(p).powi(2)).sum();

        w.smoothness * smooth + w.collision * collision + w.joint_limit * limit
    }

    /// 中间路点梯度（首末路点梯度为 0）
    fn gradient(&self, q: &[Vec<f64>], request: &TrajOptRequest<'_>) -> Vec<Vec<f64>> {
        let n = q.len();
        let dof = q[0].len();
        let w = &request.weights;
        let eps = self.settings.fd_eps;

        // 二阶差分 a[t] 只在 1..n-1 有定义
        let accel: Vec<Vec<f64>> = (0..n)
            .map(|t| {
                if t == 0 || t == n - 1 {
                    vec![0.0; dof]
                } else {
                    (0..dof)
                        .map(|j| q[t - 1][j] - 2.0 * q[t][j] + q[t + 1][j])
                        .collect()
                }
            })
            .collect();

        let mut grad = vec![vec![0.0; dof]; n];
        for t in 1..n - 1 {
            for j in 0..dof {
                grad[t][j] = w.smoothness
                    * 2.0
                    * (accel[t - 1][j] - 2.0 * accel[t][j] + accel[t + 1][j]);
            }

            let base = request.world.collision_cost(&q[t]);
            if base > 0.0 {
                let mut probe = q[t].clone();
                for j in 0..dof {
                    probe[j] = q[t][j] + eps;
                    let d = (request.world.collision_cost(&probe) - base) / eps;
                    probe[j] = q[t][j];
                    grad[t][j] += w.collision * d;
                }
            }
        }
        grad
    }

    fn optimize_one(&self, seed: &JointTrajectory, request: &TrajOptRequest<'_>) -> SeedOutcome {
        let kinematics = request.kinematics;
        let limits = kinematics.joint_limits();
        let names = kinematics.joint_names().to_vec();

        let mut q = if seed.len() == request.timesteps {
            seed.position.clone()
        } else {
            match JointTrajectory::from_path(
                names.clone(),
                &seed.position,
                request.timesteps,
                request.dt,
            ) {
                Ok(resampled) => resampled.position,
                Err(_) => seed.position.clone(),
            }
        };

        let (iterations, max_step) = if request.finetune {
            (self.settings.finetune_iterations, self.settings.finetune_max_step)
        } else {
            (self.settings.iterations, self.settings.max_step)
        };
        let stop_pos = request.position_threshold * 0.1;
        let stop_rot = request.rotation_threshold * 0.1;

        if q.len() >= 2 {
            let last = q.len() - 1;
            for _ in 0..iterations {
                let (pos_err, rot_err) = terminal_error(kinematics, &q[last], &request.goal);
                let terminal_done = pos_err <= stop_pos && rot_err <= stop_rot;
                if !terminal_done
                    && let Ok(next) = dls_step(
                        kinematics,
                        &q[last],
                        &request.goal,
                        self.settings.damping,
                        self.settings.terminal_max_step,
                    )
                {
                    q[last] = next;
                }

                if q.len() < 3 {
                    if terminal_done {
                        break;
                    }
                    continue;
                }

                let grad = self.gradient(&q, request);
                let largest = grad.iter().flatten().fold(0.0f64, |m, g| m.max(g.abs()));
                let mut improved = false;
                if largest > 1e-12 {
                    let cost = self.path_cost(&q, request);
                    let mut alpha = max_step / largest;
                    for _ in 0..self.settings.line_search_steps {
                        let mut candidate = q.clone();
                        for t in 1..last {
                            for (v, g) in candidate[t].iter_mut().zip(&grad[t]) {
                                *v -= alpha * g;
                            }
                            limits.clamp(&mut candidate[t]);
                        }
                        if self.path_cost(&candidate, request) < cost {
                            q = candidate;
                            improved = true;
                            break;
                        }
                        alpha *= 0.5;
                    }
                }

                if !improved && terminal_done {
                    break;
                }
            }
        }

        let (position_error, rotation_error) = match q.last() {
            Some(last) => terminal_error(kinematics, last, &request.goal),
            None => (f64::INFINITY, f64::INFINITY),
        };
        let cost = if q.is_empty() {
            f64::INFINITY
        } else {
            let path = if q.len() >= 3 {
                self.path_cost(&q, request)
            } else {
                0.0
            };
            path + request.weights.pose * (position_error + rotation_error)
        };

        let free = q.iter().all(|p| limits.contains(p)) && !in_collision_dense(&q, request.world);
        let converged = free
            && position_error <= request.position_threshold
            && rotation_error <= request.rotation_threshold;

        let trajectory = match JointTrajectory::new(names, request.dt, q) {
            Ok(t) => t,
            Err(_) => seed.clone(),
        };

        SeedOutcome {
            converged: converged && trajectory.len() == request.timesteps,
            trajectory,
            cost,
            position_error,
            rotation_error,
        }
    }
}

fn terminal_error(kinematics: &dyn Kinematics, q: &[f64], goal: &Pose) -> (f64, f64) {
    match kinematics.forward(q) {
        Ok(pose) => pose.distance(goal),
        Err(_) => (f64::INFINITY, f64::INFINITY),
    }
}

/// 路点及相邻中点的碰撞检查
fn in_collision_dense(q: &[Vec<f64>], world: &dyn CollisionWorld) -> bool {
    let mut samples = q.to_vec();
    samples.extend(
        q.windows(2)
            .map(|w| w[0].iter().zip(&w[1]).map(|(a, b)| 0.5 * (a + b)).collect()),
    );
    world.is_in_collision(&samples).into_iter().any(|c| c)
}

impl TrajOptimizer for GradientTrajOpt {
    fn optimize(&self, request: &TrajOptRequest<'_>) -> Result<TrajOptBatch, BackendError> {
        let dof = request.kinematics.dof();
        if let Some(bad) = request.seeds.iter().find(|s| s.dof() != dof) {
            return Err(BackendError::DofMismatch {
                expected: dof,
                actual: bad.dof(),
            });
        }
        trace!(
            seeds = request.seeds.len(),
            finetune = request.finetune,
            "Trajectory optimization batch"
        );

        let outcomes: Vec<SeedOutcome> = request
            .seeds
            .par_iter()
            .map(|seed| self.optimize_one(seed, request))
            .collect();

        let mut batch = TrajOptBatch::default();
        for outcome in outcomes {
            batch.trajectories.push(outcome.trajectory);
            batch.converged.push(outcome.converged);
            batch.cost.push(outcome.cost);
            batch.position_error.push(outcome.position_error);
            batch.rotation_error.push(outcome.rotation_error);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{SphereCollisionWorld, SphereModel};
    use crate::serial_chain::SerialChain;
    use motiongen_types::{Cuboid, WorldModel};
    use std::sync::Arc;

    fn request<'a>(
        seeds: &'a [JointTrajectory],
        goal: Pose,
        robot: &'a SerialChain,
        world: &'a SphereCollisionWorld,
    ) -> TrajOptRequest<'a> {
        TrajOptRequest {
            seeds,
            goal,
            weights: CostWeights::default(),
            dt: 0.25,
            timesteps: 16,
            position_threshold: 0.005,
            rotation_threshold: 0.05,
            finetune: false,
            kinematics: robot,
            world,
        }
    }

    #[test]
    fn test_best_converged_and_shape() {
        let traj = JointTrajectory::linear(vec![], &[0.0], &[1.0], 3, 0.1).unwrap();
        let batch = TrajOptBatch {
            trajectories: vec![traj.clone(), traj.clone(), traj],
            converged: vec![true, false, true],
            cost: vec![3.0, 1.0, 2.0],
            position_error: vec![0.0, 0.0, 0.0],
            rotation_error: vec![0.0, 0.0, 0.0],
        };
        assert_eq!(batch.best_converged(), Some(2));
        assert!(batch.check_shape(3).is_ok());
        assert!(matches!(
            batch.check_shape(4),
            Err(BackendError::ShapeMismatch {
                stage: "trajopt",
                ..
            })
        ));
        assert_eq!(TrajOptBatch::default().best_converged(), None);
    }

    #[test]
    fn test_straight_line_in_free_space_converges() {
        let robot = Arc::new(SerialChain::demo_arm());
        let world = SphereCollisionWorld::new(robot.clone(), SphereModel::default());
        let start = robot.retract_config().to_vec();
        let mut goal_q = start.clone();
        goal_q[0] += 0.3;
        let goal = robot.forward(&goal_q).unwrap();

        let seed = JointTrajectory::linear(vec![], &start, &goal_q, 16, 0.25).unwrap();
        let seeds = vec![seed.clone(), seed];
        let opt = GradientTrajOpt::default();
        let batch = opt
            .optimize(&request(&seeds, goal, &robot, &world))
            .unwrap();

        batch.check_shape(2).unwrap();
        assert!(batch.converged.iter().all(|c| *c));
        assert!(batch.position_error[0] < 0.005);
        assert_eq!(batch.trajectories[0].first_position(), start.as_slice());
        // 相同种子得到相同结果
        assert_eq!(batch.trajectories[0], batch.trajectories[1]);
    }

    #[test]
    fn test_goal_inside_obstacle_does_not_converge() {
        let robot = Arc::new(SerialChain::demo_arm());
        let mut world = SphereCollisionWorld::new(robot.clone(), SphereModel::default());
        let start = robot.retract_config().to_vec();
        let mut goal_q = start.clone();
        goal_q[0] += 0.4;
        let goal = robot.forward(&goal_q).unwrap();
        world
            .load(&WorldModel::empty().with_cuboid(Cuboid::new(
                "box",
                [0.08; 3],
                Pose::from_translation(goal.position.x, goal.position.y, goal.position.z),
            )))
            .unwrap();

        let seeds = vec![JointTrajectory::linear(vec![], &start, &goal_q, 16, 0.25).unwrap()];
        let batch = GradientTrajOpt::default()
            .optimize(&request(&seeds, goal, &robot, &world))
            .unwrap();
        assert_eq!(batch.converged, vec![false]);
        assert_eq!(batch.best_converged(), None);
        assert_eq!(batch.best_effort(), Some(0));
    }

    #[test]
    fn test_seed_with_wrong_dof_is_rejected() {
        let robot = Arc::new(SerialChain::demo_arm());
        let world = SphereCollisionWorld::new(robot.clone(), SphereModel::default());
        let seeds = vec![JointTrajectory::linear(vec![], &[0.0; 3], &[0.1; 3], 16, 0.25).unwrap()];
        let result = GradientTrajOpt::default().optimize(&request(
            &seeds,
            Pose::identity(),
            &robot,
            &world,
        ));
        assert_eq!(
            result,
            Err(BackendError::DofMismatch {
                expected: 6,
                actual: 3
            })
        );
    }
}
