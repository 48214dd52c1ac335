//! 脚本化 Mock 后端
//!
//! 每个后端按预设脚本依次返回成功/失败（脚本耗尽后重复兜底值），并在共享的
//! [`CallCounters`] 中记录调用次数、批大小和时间步长。用于在不做任何数值计算
//! 的情况下验证编排器的状态转移和调用顺序。
//!
//! Mock 运动学：`forward(q)` 是把前三个关节角当作位置的纯平移位姿。

use crate::collision::CollisionWorld;
use crate::error::BackendError;
use crate::graph::{GraphPath, GraphQuery, GraphSearch};
use crate::kinematics::{IkBatch, IkRequest, Kinematics};
use crate::trajopt::{TrajOptBatch, TrajOptRequest, TrajOptimizer};
use motiongen_types::{CacheCapacity, JointLimits, JointTrajectory, Pose, WorldModel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 脚本队列：依次弹出，耗尽后返回兜底值
#[derive(Debug)]
pub struct Script<T: Clone> {
    queue: Mutex<VecDeque<T>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    pub fn repeat(value: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: value,
        }
    }

    pub fn sequence(values: impl IntoIterator<Item = T>, fallback: T) -> Self {
        Self {
            queue: Mutex::new(values.into_iter().collect()),
            fallback,
        }
    }

    fn next(&self) -> T {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// IK 脚本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IkScript {
    /// 全部收敛
    Converge,
    /// 全部不收敛
    Fail,
    /// 前 k 个收敛
    Partial(usize),
    /// 返回少一个元素的批量（形状错误）
    Misaligned,
}

/// 图搜索脚本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphScript {
    Found,
    NotFound,
}

/// 轨迹优化脚本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrajOptScript {
    /// 全部收敛，末端误差为给定值
    Converge { position_error: f64 },
    /// 全部不收敛
    Fail,
    /// 返回后端错误
    Error,
}

/// 调用计数
#[derive(Debug, Default)]
pub struct CallCounters {
    ik: AtomicUsize,
    graph: AtomicUsize,
    trajopt: AtomicUsize,
    finetune: AtomicUsize,
    world_load: AtomicUsize,
    world_update: AtomicUsize,
    world_clear: AtomicUsize,
    batch_sizes: Mutex<Vec<(&'static str, usize)>>,
    dts: Mutex<Vec<f64>>,
    graph_budgets: Mutex<Vec<Duration>>,
}

impl CallCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ik_calls(&self) -> usize {
        self.ik.load(Ordering::SeqCst)
    }

    pub fn graph_calls(&self) -> usize {
        self.graph.load(Ordering::SeqCst)
    }

    pub fn trajopt_calls(&self) -> usize {
        self.trajopt.load(Ordering::SeqCst)
    }

    pub fn finetune_calls(&self) -> usize {
        self.finetune.load(Ordering::SeqCst)
    }

    pub fn world_loads(&self) -> usize {
        self.world_load.load(Ordering::SeqCst)
    }

    pub fn world_updates(&self) -> usize {
        self.world_update.load(Ordering::SeqCst)
    }

    pub fn world_clears(&self) -> usize {
        self.world_clear.load(Ordering::SeqCst)
    }

    /// 某阶段每次调用的批大小（`"ik"`/`"graph"`/`"trajopt"`/`"finetune"`）
    pub fn batch_sizes(&self, stage: &str) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, n)| *n)
            .collect()
    }

    /// 轨迹优化/精调调用的 dt 序列
    pub fn dts(&self) -> Vec<f64> {
        self.dts.lock().clone()
    }

    /// 每次图搜索收到的时间预算
    pub fn graph_budgets(&self) -> Vec<Duration> {
        self.graph_budgets.lock().clone()
    }

    /// 所有后端调用总数
    pub fn solver_calls(&self) -> usize {
        self.ik_calls() + self.graph_calls() + self.trajopt_calls() + self.finetune_calls()
    }

    fn record(&self, stage: &'static str, size: usize) {
        self.batch_sizes.lock().push((stage, size));
    }
}

/// Mock 运动学
#[derive(Debug)]
pub struct MockKinematics {
    names: Vec<String>,
    limits: JointLimits,
    retract: Vec<f64>,
    script: Script<IkScript>,
    counters: Arc<CallCounters>,
}

impl MockKinematics {
    /// `dof` 至少为 3
    pub fn new(dof: usize, script: Script<IkScript>, counters: Arc<CallCounters>) -> Self {
        let dof = dof.max(3);
        Self {
            names: (0..dof).map(|i| format!("joint_{}", i + 1)).collect(),
            limits: JointLimits {
                lower: vec![-3.0; dof],
                upper: vec![3.0; dof],
                velocity: vec![1.0; dof],
                acceleration: vec![5.0; dof],
                jerk: vec![50.0; dof],
            },
            retract: vec![0.0; dof],
            script,
            counters,
        }
    }
}

impl Kinematics for MockKinematics {
    fn dof(&self) -> usize {
        self.names.len()
    }

    fn joint_names(&self) -> &[String] {
        &self.names
    }

    fn joint_limits(&self) -> &JointLimits {
        &self.limits
    }

    fn retract_config(&self) -> &[f64] {
        &self.retract
    }

    fn forward(&self, q: &[f64]) -> Result<Pose, BackendError> {
        if q.len() != self.dof() {
            return Err(BackendError::DofMismatch {
                expected: self.dof(),
                actual: q.len(),
            });
        }
        Ok(Pose::from_translation(q[0], q[1], q[2]))
    }

    fn batched_ik(&self, request: &IkRequest) -> Result<IkBatch, BackendError> {
        self.counters.ik.fetch_add(1, Ordering::SeqCst);
        self.counters.record("ik", request.seed_count);

        let mut solution = vec![0.0; self.dof()];
        solution[..3].copy_from_slice(request.goal.position.as_slice());

        let n = request.seed_count;
        let converged_count = match self.script.next() {
            IkScript::Converge => n,
            IkScript::Fail => 0,
            IkScript::Partial(k) => k.min(n),
            IkScript::Misaligned => {
                return Ok(IkBatch {
                    solutions: vec![solution; n.saturating_sub(1)],
                    converged: vec![true; n.saturating_sub(1)],
                    position_error: vec![0.0; n.saturating_sub(1)],
                    rotation_error: vec![0.0; n.saturating_sub(1)],
                });
            },
        };

        let mut batch = IkBatch::default();
        for i in 0..n {
            let converged = i < converged_count;
            // 未收敛的种子残差随下标递增，便于验证按残差排序
            let error = if converged { 0.0 } else { 0.1 * (i + 1) as f64 };
            batch.solutions.push(solution.clone());
            batch.converged.push(converged);
            batch.position_error.push(error);
            batch.rotation_error.push(0.0);
        }
        Ok(batch)
    }
}

type CollisionFn = Box<dyn Fn(&[f64]) -> bool + Send + Sync>;

/// Mock 碰撞世界
pub struct MockWorld {
    colliding: CollisionFn,
    capacity: CacheCapacity,
    loaded: CacheCapacity,
    counters: Arc<CallCounters>,
}

impl std::fmt::Debug for MockWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWorld")
            .field("capacity", &self.capacity)
            .field("loaded", &self.loaded)
            .finish()
    }
}

impl MockWorld {
    /// 无碰撞的世界
    pub fn free(counters: Arc<CallCounters>) -> Self {
        Self::with_collision_fn(|_| false, counters)
    }

    /// 由判定函数决定碰撞
    pub fn with_collision_fn(
        colliding: impl Fn(&[f64]) -> bool + Send + Sync + 'static,
        counters: Arc<CallCounters>,
    ) -> Self {
        Self {
            colliding: Box::new(colliding),
            capacity: CacheCapacity::default(),
            loaded: CacheCapacity::default(),
            counters,
        }
    }
}

impl CollisionWorld for MockWorld {
    fn load(&mut self, world: &WorldModel) -> Result<(), BackendError> {
        self.counters.world_load.fetch_add(1, Ordering::SeqCst);
        self.loaded = world.cache_requirement();
        self.capacity = self.capacity.max(self.loaded);
        Ok(())
    }

    fn clear_cache(&mut self) {
        self.counters.world_clear.fetch_add(1, Ordering::SeqCst);
        self.loaded = CacheCapacity::default();
    }

    fn update(&mut self, world: &WorldModel) -> Result<(), BackendError> {
        self.counters.world_update.fetch_add(1, Ordering::SeqCst);
        let required = world.cache_requirement();
        if !required.fits_in(&self.capacity) {
            return Err(BackendError::CacheCapacityExceeded {
                required,
                capacity: self.capacity,
            });
        }
        self.loaded = required;
        Ok(())
    }

    fn capacity(&self) -> CacheCapacity {
        self.capacity
    }

    fn reserve(&mut self, capacity: CacheCapacity) -> Result<(), BackendError> {
        self.capacity = capacity.max(self.loaded);
        Ok(())
    }

    fn is_in_collision(&self, waypoints: &[Vec<f64>]) -> Vec<bool> {
        waypoints.iter().map(|q| (self.colliding)(q)).collect()
    }

    fn collision_cost(&self, q: &[f64]) -> f64 {
        if (self.colliding)(q) { 1.0 } else { 0.0 }
    }
}

/// Mock 图搜索：找到时返回「起点-中点-终点」三点路径
#[derive(Debug)]
pub struct MockGraph {
    script: Script<GraphScript>,
    counters: Arc<CallCounters>,
}

impl MockGraph {
    pub fn new(script: Script<GraphScript>, counters: Arc<CallCounters>) -> Self {
        Self { script, counters }
    }
}

impl GraphSearch for MockGraph {
    fn search_batch(
        &self,
        queries: &[GraphQuery],
        _world: &dyn CollisionWorld,
        budget: Duration,
    ) -> Result<Vec<Option<GraphPath>>, BackendError> {
        self.counters.graph.fetch_add(1, Ordering::SeqCst);
        self.counters.graph_budgets.lock().push(budget);
        self.counters.record("graph", queries.len());

        let found = self.script.next() == GraphScript::Found;
        Ok(queries
            .iter()
            .map(|q| {
                found.then(|| {
                    let mid = q
                        .start
                        .iter()
                        .zip(&q.goal)
                        .map(|(a, b)| 0.5 * (a + b))
                        .collect();
                    vec![q.start.clone(), mid, q.goal.clone()]
                })
            })
            .collect())
    }
}

/// Mock 轨迹优化：原样返回种子，收敛与否和误差由脚本决定
///
/// 粗优化和精调使用各自的脚本和计数器。
#[derive(Debug)]
pub struct MockTrajOpt {
    script: Script<TrajOptScript>,
    finetune_script: Script<TrajOptScript>,
    delay: Duration,
    counters: Arc<CallCounters>,
}

impl MockTrajOpt {
    pub fn new(
        script: Script<TrajOptScript>,
        finetune_script: Script<TrajOptScript>,
        counters: Arc<CallCounters>,
    ) -> Self {
        Self {
            script,
            finetune_script,
            delay: Duration::ZERO,
            counters,
        }
    }

    /// 每次调用先阻塞 `delay`，模拟耗时的批量求解
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl TrajOptimizer for MockTrajOpt {
    fn optimize(&self, request: &TrajOptRequest<'_>) -> Result<TrajOptBatch, BackendError> {
        let (stage, counter, script) = if request.finetune {
            ("finetune", &self.counters.finetune, &self.finetune_script)
        } else {
            ("trajopt", &self.counters.trajopt, &self.script)
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.counters.record(stage, request.seeds.len());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.counters.dts.lock().push(request.dt);

        let (converged, position_error) = match script.next() {
            TrajOptScript::Converge { position_error } => (true, position_error),
            TrajOptScript::Fail => (false, 1.0),
            TrajOptScript::Error => {
                return Err(BackendError::Numerical("scripted optimizer error".into()));
            },
        };

        let n = request.seeds.len();
        let mut batch = TrajOptBatch::default();
        for (i, seed) in request.seeds.iter().enumerate() {
            let trajectory = JointTrajectory::from_path(
                seed.joint_names.clone(),
                &seed.position,
                request.timesteps,
                request.dt,
            )?;
            batch.trajectories.push(trajectory);
            batch.converged.push(converged);
            // 越靠后的种子代价越低，便于验证按代价选择
            batch.cost.push((n - i) as f64);
            batch.position_error.push(position_error);
            batch.rotation_error.push(0.0);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sequence_then_fallback() {
        let script = Script::sequence([1, 2], 9);
        assert_eq!(script.next(), 1);
        assert_eq!(script.next(), 2);
        assert_eq!(script.next(), 9);
        assert_eq!(script.next(), 9);
    }

    #[test]
    fn test_mock_ik_counts_calls() {
        let counters = CallCounters::new();
        let kin = MockKinematics::new(
            6,
            Script::sequence([IkScript::Partial(2)], IkScript::Fail),
            counters.clone(),
        );
        let request = IkRequest {
            goal: Pose::from_translation(0.1, 0.2, 0.3),
            seed_count: 4,
            seed_hint: None,
            position_threshold: 0.005,
            rotation_threshold: 0.05,
        };
        let batch = kin.batched_ik(&request).unwrap();
        assert_eq!(batch.converged, vec![true, true, false, false]);
        assert_eq!(&batch.solutions[0][..3], &[0.1, 0.2, 0.3]);
        assert_eq!(kin.batched_ik(&request).unwrap().converged_count(), 0);
        assert_eq!(counters.ik_calls(), 2);
        assert_eq!(counters.batch_sizes("ik"), vec![4, 4]);
    }

    #[test]
    fn test_mock_world_capacity() {
        let counters = CallCounters::new();
        let mut world = MockWorld::with_collision_fn(|q| q[0] > 1.0, counters.clone());
        world.reserve(CacheCapacity::new(1, 0)).unwrap();
        let two = WorldModel::empty()
            .with_cuboid(motiongen_types::Cuboid::new("a", [0.1; 3], Pose::identity()))
            .with_cuboid(motiongen_types::Cuboid::new("b", [0.1; 3], Pose::identity()));
        assert!(world.update(&two).is_err());
        assert_eq!(
            world.is_in_collision(&[vec![0.0, 0.0, 0.0], vec![2.0, 0.0, 0.0]]),
            vec![false, true]
        );
        assert_eq!(counters.world_updates(), 1);
    }
}
