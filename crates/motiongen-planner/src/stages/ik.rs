//! IK 种子阶段
//!
//! 一次批量 IK 调用得到 `num_ik_seeds` 个候选，然后按
//! （是否碰撞, 归一化残差）排序。碰撞的收敛解不会被丢弃：目标位姿本身落在
//! 障碍物内时，应由优化/图搜索阶段报告失败，而不是 IK 阶段。

use super::StageContext;
use motiongen_backend::{BackendError, IkRequest};
use motiongen_types::Pose;
use tracing::trace;

/// IK 阶段输出
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IkSeeds {
    /// 按优先级排序的目标关节角
    pub goals: Vec<Vec<f64>>,
    /// 收敛的种子数（0 表示使用了部分解）
    pub converged: usize,
}

/// 运行批量 IK
///
/// 没有收敛解且不允许部分解时返回 `Ok(None)`。
pub(crate) fn solve(
    ctx: &StageContext<'_>,
    start: &[f64],
    goal: &Pose,
    partial_ik_opt: bool,
) -> Result<Option<IkSeeds>, BackendError> {
    let config = ctx.config;
    let request = IkRequest {
        goal: *goal,
        seed_count: config.num_ik_seeds,
        seed_hint: Some(start.to_vec()),
        position_threshold: config.position_threshold,
        rotation_threshold: config.rotation_threshold,
    };
    let batch = ctx.kinematics.batched_ik(&request)?;
    batch.check_shape(request.seed_count, ctx.kinematics.dof())?;

    let colliding = ctx.world.is_in_collision(&batch.solutions);
    if colliding.len() != batch.len() {
        return Err(BackendError::ShapeMismatch {
            stage: "collision",
            expected: batch.len(),
            actual: colliding.len(),
        });
    }

    let residual = |i: usize| {
        batch.position_error[i] / config.position_threshold
            + batch.rotation_error[i] / config.rotation_threshold
    };
    let mut order: Vec<usize> = (0..batch.len()).collect();
    order.sort_by(|&a, &b| {
        colliding[a]
            .cmp(&colliding[b])
            .then_with(|| residual(a).total_cmp(&residual(b)))
    });

    let converged: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| batch.converged[i])
        .collect();
    trace!(
        converged = converged.len(),
        seeds = batch.len(),
        "IK batch ranked"
    );

    if !converged.is_empty() {
        return Ok(Some(IkSeeds {
            goals: converged
                .iter()
                .map(|&i| batch.solutions[i].clone())
                .collect(),
            converged: converged.len(),
        }));
    }

    if partial_ik_opt && let Some(&best) = order.first() {
        return Ok(Some(IkSeeds {
            goals: vec![batch.solutions[best].clone()],
            converged: 0,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionGenConfig;
    use motiongen_backend::Kinematics;
    use motiongen_backend::mock::{CallCounters, IkScript, MockKinematics, MockWorld, Script};

    fn run(script: IkScript, partial: bool, world: &MockWorld) -> Result<Option<IkSeeds>, BackendError> {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(script), counters);
        let config = MotionGenConfig {
            num_ik_seeds: 4,
            ..Default::default()
        };
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world,
        };
        let start = kin.retract_config().to_vec();
        solve(&ctx, &start, &Pose::from_translation(0.1, 0.2, 0.3), partial)
    }

    #[test]
    fn test_converged_seeds_are_returned() {
        let world = MockWorld::free(CallCounters::new());
        let seeds = run(IkScript::Partial(2), false, &world).unwrap().unwrap();
        assert_eq!(seeds.converged, 2);
        assert_eq!(seeds.goals.len(), 2);
        assert_eq!(seeds.goals[0], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_no_convergence_without_partial_fails() {
        let world = MockWorld::free(CallCounters::new());
        assert_eq!(run(IkScript::Fail, false, &world).unwrap(), None);
    }

    #[test]
    fn test_partial_uses_lowest_residual() {
        let world = MockWorld::free(CallCounters::new());
        let seeds = run(IkScript::Fail, true, &world).unwrap().unwrap();
        assert_eq!(seeds.converged, 0);
        assert_eq!(seeds.goals.len(), 1);
    }

    #[test]
    fn test_colliding_solutions_still_count() {
        let world = MockWorld::with_collision_fn(|_| true, CallCounters::new());
        let seeds = run(IkScript::Converge, false, &world).unwrap().unwrap();
        assert_eq!(seeds.converged, 4);
    }

    #[test]
    fn test_misaligned_batch_is_error() {
        let world = MockWorld::free(CallCounters::new());
        assert!(matches!(
            run(IkScript::Misaligned, true, &world),
            Err(BackendError::ShapeMismatch { stage: "ik", .. })
        ));
    }
}
