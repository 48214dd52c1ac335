//! 图搜索阶段
//!
//! 对前 `num_graph_seeds` 个 IK 目标发起一次批量搜索；找到的路径按弧长重采样为
//! `trajopt_tsteps` 个路点，作为轨迹优化的种子。搜索预算不超过请求剩余时间。

use super::{StageContext, pad_cyclic};
use motiongen_backend::{BackendError, GraphQuery, GraphSearch};
use motiongen_types::JointTrajectory;
use std::time::Instant;
use tracing::trace;

/// 图搜索阶段输出
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GraphSeeds {
    /// 重采样后的种子轨迹（只含找到的路径）
    pub seeds: Vec<JointTrajectory>,
}

impl GraphSeeds {
    pub fn found(&self) -> usize {
        self.seeds.len()
    }
}

pub(crate) fn search(
    ctx: &StageContext<'_>,
    graph: &dyn GraphSearch,
    start: &[f64],
    goals: &[Vec<f64>],
    deadline: Instant,
) -> Result<GraphSeeds, BackendError> {
    let config = ctx.config;
    let queries: Vec<GraphQuery> = pad_cyclic(goals, config.num_graph_seeds, config.use_batch_padding)
        .into_iter()
        .map(|goal| GraphQuery {
            start: start.to_vec(),
            goal,
        })
        .collect();

    let budget = config
        .graph_budget()
        .min(deadline.saturating_duration_since(Instant::now()));
    let paths = graph.search_batch(&queries, ctx.world, budget)?;
    if paths.len() != queries.len() {
        return Err(BackendError::ShapeMismatch {
            stage: "graph",
            expected: queries.len(),
            actual: paths.len(),
        });
    }

    let names = ctx.kinematics.joint_names().to_vec();
    let seeds = paths
        .iter()
        .flatten()
        .map(|path| {
            JointTrajectory::from_path(names.clone(), path, config.trajopt_tsteps, config.trajopt_dt)
        })
        .collect::<Result<Vec<_>, _>>()?;

    trace!(
        queries = queries.len(),
        budget_ms = budget.as_secs_f64() * 1e3,
        found = seeds.len(),
        "Graph stage finished"
    );
    Ok(GraphSeeds { seeds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionGenConfig;
    use motiongen_backend::mock::{
        CallCounters, GraphScript, IkScript, MockGraph, MockKinematics, MockWorld, Script,
    };
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn test_graph_batch_is_padded() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let graph = MockGraph::new(Script::repeat(GraphScript::Found), counters.clone());
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };

        let out = search(&ctx, &graph, &[0.0; 3], &[vec![0.3, 0.0, 0.0]], far_deadline()).unwrap();
        assert_eq!(counters.batch_sizes("graph"), vec![config.num_graph_seeds]);
        assert_eq!(out.found(), config.num_graph_seeds);
        assert_eq!(out.seeds[0].len(), config.trajopt_tsteps);
        assert_eq!(out.seeds[0].last_position(), &[0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_graph_not_found() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let graph = MockGraph::new(Script::repeat(GraphScript::NotFound), counters.clone());
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };
        let out = search(&ctx, &graph, &[0.0; 3], &[vec![0.3, 0.0, 0.0]], far_deadline()).unwrap();
        assert_eq!(out.found(), 0);
    }

    #[test]
    fn test_graph_budget_limited_by_deadline() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(3, Script::repeat(IkScript::Converge), counters.clone());
        let world = MockWorld::free(counters.clone());
        let graph = MockGraph::new(Script::repeat(GraphScript::Found), counters.clone());
        let config = MotionGenConfig::default();
        let ctx = StageContext {
            config: &config,
            kinematics: &kin,
            world: &world,
        };

        let goals = [vec![0.3, 0.0, 0.0]];
        search(&ctx, &graph, &[0.0; 3], &goals, far_deadline()).unwrap();
        let deadline = Instant::now() + Duration::from_millis(100);
        search(&ctx, &graph, &[0.0; 3], &goals, deadline).unwrap();
        search(&ctx, &graph, &[0.0; 3], &goals, Instant::now()).unwrap();

        let budgets = counters.graph_budgets();
        assert_eq!(budgets[0], config.graph_budget());
        assert!(budgets[1] <= Duration::from_millis(100));
        assert!(budgets[1] < config.graph_budget());
        assert_eq!(budgets[2], Duration::ZERO);
    }
}
