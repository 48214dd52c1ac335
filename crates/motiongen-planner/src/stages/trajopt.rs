//! 轨迹优化阶段
//!
//! 种子来自图搜索路径，或起点到各 IK 目标的直线插值。整批填充到
//! `num_trajopt_seeds` 后一次调用优化器，取代价最低的收敛种子。

use super::{StageContext, pad_cyclic};
use motiongen_backend::{BackendError, TrajOptRequest, TrajOptimizer};
use motiongen_types::{JointTrajectory, Pose, TypesError};
use tracing::trace;

/// 优化得到的候选轨迹
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub trajectory: JointTrajectory,
    pub cost: f64,
    pub position_error: f64,
    pub rotation_error: f64,
}

impl Candidate {
    /// 末端误差是否在阈值内
    pub fn within(&self, position_threshold: f64, rotation_threshold: f64) -> bool {
        self.position_error <= position_threshold && self.rotation_error <= rotation_threshold
    }
}

/// 轨迹优化阶段输出
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrajOptOutcome {
    /// 代价最低的收敛候选
    pub best: Option<Candidate>,
    /// 所有种子中最小的末端误差（不论是否收敛）
    pub best_effort: Option<(f64, f64)>,
}

/// 起点到每个 IK 目标的直线种子
pub(crate) fn direct_seeds(
    ctx: &StageContext<'_>,
    start: &[f64],
    goals: &[Vec<f64>],
) -> Result<Vec<JointTrajectory>, TypesError> {
    let names = ctx.kinematics.joint_names().to_vec();
    goals
        .iter()
        .take(ctx.config.num_trajopt_seeds)
        .map(|goal| {
            JointTrajectory::linear(
                names.clone(),
                start,
                goal,
                ctx.config.trajopt_tsteps,
                ctx.config.trajopt_dt,
            )
        })
        .collect()
}

/// 对一组种子做一次批量优化
pub(crate) fn optimize(
    ctx: &StageContext<'_>,
    optimizer: &dyn TrajOptimizer,
    seeds: &[JointTrajectory],
    goal: &Pose,
    dt: f64,
    finetune: bool,
) -> Result<TrajOptOutcome, BackendError> {
    let config = ctx.config;
    let batch_seeds = pad_cyclic(seeds, config.num_trajopt_seeds, config.use_batch_padding);
    let request = TrajOptRequest {
        seeds: &batch_seeds,
        goal: *goal,
        weights: config.cost_weights,
        dt,
        timesteps: config.trajopt_tsteps,
        position_threshold: config.position_threshold,
        rotation_threshold: config.rotation_threshold,
        finetune,
        kinematics: ctx.kinematics,
        world: ctx.world,
    };

    let batch = optimizer.optimize(&request)?;
    batch.check_shape(batch_seeds.len())?;

    let best = batch.best_converged().map(|i| Candidate {
        trajectory: batch.trajectories[i].clone(),
        cost: batch.cost[i],
        position_error: batch.position_error[i],
        rotation_error: batch.rotation_error[i],
    });
    let best_effort = batch
        .best_effort()
        .map(|i| (batch.position_error[i], batch.rotation_error[i]));

    trace!(
        seeds = batch_seeds.len(),
        converged = batch.converged.iter().filter(|c| **c).count(),
        finetune,
        "Trajectory optimization stage finished"
    );
    Ok(TrajOptOutcome { best, best_effort })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionGenConfig;
    use motiongen_backend::mock::{
        CallCounters, IkScript, MockKinematics, MockTrajOpt, MockWorld, Script, TrajOptScript,
    };

    #[test]
    fn test_optimize_picks_lowest_cost_and_pads() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let opt = MockTrajOpt::new(
            Script::repeat(TrajOptScript::Converge {
                position_error: 0.001,
            }),
            Script::repeat(TrajOptScript::Fail),
            counters.clone(),
        );
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };

        let seeds = direct_seeds(&ctx, &[0.0; 3], &[vec![0.3, 0.0, 0.0]]).unwrap();
        assert_eq!(seeds.len(), 1);
        let out = optimize(
            &ctx,
            &opt,
            &seeds,
            &Pose::from_translation(0.3, 0.0, 0.0),
            config.trajopt_dt,
            false,
        )
        .unwrap();

        assert_eq!(counters.batch_sizes("trajopt"), vec![config.num_trajopt_seeds]);
        let best = out.best.unwrap();
        // Mock 代价随下标递减，最后一个种子最优
        assert_eq!(best.cost, 1.0);
        assert!(best.within(config.position_threshold, config.rotation_threshold));
        assert_eq!(out.best_effort, Some((0.001, 0.0)));
    }

    #[test]
    fn test_optimize_without_convergence() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let opt = MockTrajOpt::new(
            Script::repeat(TrajOptScript::Fail),
            Script::repeat(TrajOptScript::Fail),
            counters.clone(),
        );
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };
        let seeds = direct_seeds(&ctx, &[0.0; 3], &[vec![0.3, 0.0, 0.0]]).unwrap();
        let out = optimize(&ctx, &opt, &seeds, &Pose::identity(), 0.25, false).unwrap();
        assert!(out.best.is_none());
        assert_eq!(out.best_effort, Some((1.0, 0.0)));
    }
}
