//! 图搜索接口与 RRT-Connect 参考实现
//!
//! 一次调用处理一批（起点, 终点）查询，返回逐个对齐的可选路径。
//! 每个查询使用独立的随机数发生器（种子在调用开始时按顺序从主发生器抽取），
//! 因此并行执行不影响结果的可复现性。

use crate::collision::CollisionWorld;
use crate::error::BackendError;
use motiongen_types::JointLimits;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::cell::RefCell;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 单个图搜索查询
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub start: Vec<f64>,
    pub goal: Vec<f64>,
}

/// 离散路径（关节空间路点序列，含起点和终点）
pub type GraphPath = Vec<Vec<f64>>;

/// 图搜索后端
pub trait GraphSearch: Send + Sync {
    /// 批量搜索；`budget` 是整批共享的时间预算
    fn search_batch(
        &self,
        queries: &[GraphQuery],
        world: &dyn CollisionWorld,
        budget: Duration,
    ) -> Result<Vec<Option<GraphPath>>, BackendError>;

    /// 重置随机种子
    fn reset_seed(&self) {}
}

/// RRT-Connect 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrtSettings {
    /// 单步扩展长度（rad）
    pub extend_length: f64,
    /// 最大扩展次数
    pub max_try: usize,
}

impl Default for RrtSettings {
    fn default() -> Self {
        Self {
            extend_length: 0.05,
            max_try: 4000,
        }
    }
}

/// 基于 `rrt` crate 的双向 RRT-Connect
pub struct RrtConnectSearch {
    limits: JointLimits,
    settings: RrtSettings,
    seed: u64,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for RrtConnectSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RrtConnectSearch")
            .field("settings", &self.settings)
            .field("seed", &self.seed)
            .finish()
    }
}

impl RrtConnectSearch {
    pub fn new(limits: JointLimits, settings: RrtSettings) -> Self {
        Self {
            limits,
            settings,
            seed: 0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn search_one(
        &self,
        query: &GraphQuery,
        world: &dyn CollisionWorld,
        seed: u64,
        deadline: Instant,
    ) -> Option<GraphPath> {
        let dof = self.limits.dof();
        if query.start.len() != dof || query.goal.len() != dof {
            return None;
        }
        let ends = world.is_in_collision(&[query.start.clone(), query.goal.clone()]);
        if ends.iter().any(|c| *c) {
            trace!("Graph query endpoint in collision");
            return None;
        }

        let rng = RefCell::new(StdRng::seed_from_u64(seed));
        let sample = || {
            let mut rng = rng.borrow_mut();
            self.limits
                .ranges()
                .map(|(lo, hi)| rng.gen_range(lo..=hi))
                .collect::<Vec<f64>>()
        };
        let is_free = |q: &[f64]| {
            Instant::now() < deadline
                && self.limits.contains(q)
                && !world.is_in_collision(&[q.to_vec()])[0]
        };

        match rrt::dual_rrt_connect(
            &query.start,
            &query.goal,
            is_free,
            sample,
            self.settings.extend_length,
            self.settings.max_try,
        ) {
            Ok(path) if self.path_is_free(&path, world) => Some(path),
            Ok(_) => {
                trace!("RRT path rejected by dense edge check");
                None
            },
            Err(e) => {
                trace!("RRT-Connect failed: {e:?}");
                None
            },
        }
    }

    /// 以半个扩展步长对每条边做稠密检查
    fn path_is_free(&self, path: &[Vec<f64>], world: &dyn CollisionWorld) -> bool {
        let step = self.settings.extend_length * 0.5;
        let mut samples = Vec::new();
        for edge in path.windows(2) {
            let (a, b) = (&edge[0], &edge[1]);
            let length = motiongen_types::joint_distance(a, b);
            let n = ((length / step).ceil() as usize).max(1);
            for i in 1..n {
                let s = i as f64 / n as f64;
                samples.push(a.iter().zip(b).map(|(x, y)| x + (y - x) * s).collect());
            }
        }
        !world.is_in_collision(&samples).into_iter().any(|c| c)
    }
}

impl GraphSearch for RrtConnectSearch {
    fn search_batch(
        &self,
        queries: &[GraphQuery],
        world: &dyn CollisionWorld,
        budget: Duration,
    ) -> Result<Vec<Option<GraphPath>>, BackendError> {
        let deadline = Instant::now() + budget;
        let seeds: Vec<u64> = {
            let mut rng = self.rng.lock();
            queries.iter().map(|_| rng.r#gen()).collect()
        };

        let paths: Vec<Option<GraphPath>> = queries
            .par_iter()
            .zip(seeds)
            .map(|(query, seed)| self.search_one(query, world, seed, deadline))
            .collect();

        debug!(
            queries = queries.len(),
            found = paths.iter().filter(|p| p.is_some()).count(),
            "Graph search batch finished"
        );
        Ok(paths)
    }

    fn reset_seed(&self) {
        *self.rng.lock() = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{SphereCollisionWorld, SphereModel};
    use crate::kinematics::Kinematics;
    use crate::serial_chain::SerialChain;
    use motiongen_types::{Cuboid, Pose, WorldModel};
    use std::sync::Arc;

    fn setup() -> (Arc<SerialChain>, SphereCollisionWorld, RrtConnectSearch) {
        let robot = Arc::new(SerialChain::demo_arm());
        let world = SphereCollisionWorld::new(robot.clone(), SphereModel::default());
        let search = RrtConnectSearch::new(robot.joint_limits().clone(), RrtSettings::default());
        (robot, world, search)
    }

    #[test]
    fn test_free_space_path() {
        let (robot, world, search) = setup();
        let start = robot.retract_config().to_vec();
        let goal = vec![0.5, 0.3, 0.8, 0.2, 0.9, -0.3];
        let paths = search
            .search_batch(
                &[GraphQuery {
                    start: start.clone(),
                    goal: goal.clone(),
                }],
                &world,
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(paths.len(), 1);
        let path = paths[0].as_ref().unwrap();
        assert_eq!(path.first().unwrap(), &start);
        assert_eq!(path.last().unwrap(), &goal);
    }

    #[test]
    fn test_goal_in_collision_fails() {
        let (robot, mut world, search) = setup();
        let start = robot.retract_config().to_vec();
        let goal = vec![0.5, 0.3, 0.8, 0.2, 0.9, -0.3];
        let ee = robot.forward(&goal).unwrap().position;
        world
            .load(&WorldModel::empty().with_cuboid(Cuboid::new(
                "box",
                [0.1; 3],
                Pose::from_translation(ee.x, ee.y, ee.z),
            )))
            .unwrap();

        let queries = vec![GraphQuery { start, goal }; 3];
        let paths = search
            .search_batch(&queries, &world, Duration::from_secs(1))
            .unwrap();
        assert_eq!(paths, vec![None, None, None]);
    }

    #[test]
    fn test_zero_budget_fails() {
        let (robot, world, search) = setup();
        let query = GraphQuery {
            start: robot.retract_config().to_vec(),
            goal: vec![-1.0, 0.3, 0.8, 0.2, 0.9, -0.3],
        };
        let paths = search
            .search_batch(&[query], &world, Duration::ZERO)
            .unwrap();
        assert_eq!(paths, vec![None]);
    }
}
