//! 精调阶段
//!
//! 以最优候选为种子重新优化。第 k 次重试（0 起）使用
//! `clamp(optimized_dt * finetune_dt_scale^(k+1))` 作为时间步长，直到末端误差
//! 落入阈值或重试次数用完。截止时间在两次重试之间检查。

use super::StageContext;
use super::trajopt::{self, Candidate};
use motiongen_backend::{BackendError, TrajOptimizer};
use motiongen_types::Pose;
use std::time::Instant;
use tracing::{debug, trace};

/// 精调阶段输出
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FinetuneOutcome {
    /// 满足阈值的候选
    pub candidate: Option<Candidate>,
    /// 最后一次使用的时间步长
    pub dt: f64,
    /// 实际执行的重试次数
    pub retries: usize,
}

/// 第 `retry` 次重试的时间步长
pub(crate) fn retry_dt(ctx: &StageContext<'_>, optimized_dt: f64, retry: usize) -> f64 {
    let scale = ctx.config.finetune_dt_scale.powi(retry as i32 + 1);
    ctx.config.clamp_dt(optimized_dt * scale)
}

pub(crate) fn finetune(
    ctx: &StageContext<'_>,
    optimizer: &dyn TrajOptimizer,
    best: &Candidate,
    goal: &Pose,
    optimized_dt: f64,
    attempts: usize,
    deadline: Instant,
) -> Result<FinetuneOutcome, BackendError> {
    let config = ctx.config;
    let mut outcome = FinetuneOutcome {
        candidate: None,
        dt: optimized_dt,
        retries: 0,
    };

    for retry in 0..attempts {
        if retry > 0 && Instant::now() >= deadline {
            debug!(retry, "Finetune stopped at deadline");
            break;
        }
        let dt = retry_dt(ctx, optimized_dt, retry);
        let seed = best.trajectory.with_dt(dt)?;
        let result = trajopt::optimize(ctx, optimizer, &[seed], goal, dt, true)?;

        outcome.dt = dt;
        outcome.retries = retry + 1;
        if let Some(candidate) = result.best
            && candidate.within(config.position_threshold, config.rotation_threshold)
        {
            trace!(retry, dt, "Finetune reached tolerance");
            outcome.candidate = Some(candidate);
            break;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionGenConfig;
    use approx::assert_relative_eq;
    use motiongen_backend::mock::{
        CallCounters, IkScript, MockKinematics, MockTrajOpt, MockWorld, Script, TrajOptScript,
    };
    use motiongen_types::JointTrajectory;
    use std::time::Duration;

    fn candidate() -> Candidate {
        Candidate {
            trajectory: JointTrajectory::linear(vec![], &[0.0; 3], &[0.3, 0.0, 0.0], 32, 0.25)
                .unwrap(),
            cost: 1.0,
            position_error: 0.02,
            rotation_error: 0.0,
        }
    }

    #[test]
    fn test_retry_dt_scales_and_clamps() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters);
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };
        assert_relative_eq!(retry_dt(&ctx, 0.05, 0), 0.0525, epsilon = 1e-12);
        assert_relative_eq!(retry_dt(&ctx, 0.05, 1), 0.05 * 1.05 * 1.05, epsilon = 1e-12);
        assert_eq!(retry_dt(&ctx, 0.2, 0), config.maximum_trajectory_dt);
        assert_eq!(retry_dt(&ctx, 0.0, 0), config.minimum_trajectory_dt);
    }

    #[test]
    fn test_finetune_retries_until_tolerance() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let opt = MockTrajOpt::new(
            Script::repeat(TrajOptScript::Fail),
            Script::sequence(
                [
                    TrajOptScript::Fail,
                    TrajOptScript::Converge {
                        position_error: 0.01,
                    },
                ],
                TrajOptScript::Converge {
                    position_error: 0.001,
                },
            ),
            counters.clone(),
        );
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };

        let deadline = Instant::now() + Duration::from_secs(10);
        let out = finetune(
            &ctx,
            &opt,
            &candidate(),
            &Pose::from_translation(0.3, 0.0, 0.0),
            0.05,
            3,
            deadline,
        )
        .unwrap();

        assert_eq!(out.retries, 3);
        assert!(out.candidate.is_some());
        assert_eq!(counters.finetune_calls(), 3);
        let dts = counters.dts();
        assert_relative_eq!(dts[1] / dts[0], 1.05, epsilon = 1e-9);
        assert_relative_eq!(dts[2] / dts[1], 1.05, epsilon = 1e-9);
        assert_eq!(out.dt, dts[2]);
    }

    #[test]
    fn test_finetune_exhausts_retries() {
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
        let deadline = Instant::now() + Duration::from_secs(10);
        let out = finetune(&ctx, &opt, &candidate(), &Pose::identity(), 0.05, 2, deadline).unwrap();
        assert!(out.candidate.is_none());
        assert_eq!(out.retries, 2);
        assert_eq!(counters.finetune_calls(), 2);
    }
}
