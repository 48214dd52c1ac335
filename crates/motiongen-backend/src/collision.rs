//! 碰撞世界接口与球体参考实现
//!
//! 机器人用沿连杆等距分布的球近似，障碍物统一为 OBB（网格取包围盒）。
//! 后端持有一个按障碍物数量计的缓存：`load` 可以扩容，`update` 只能在
//! 已有容量内替换障碍物，超出时返回 [`BackendError::CacheCapacityExceeded`]。

use crate::error::BackendError;
use crate::serial_chain::SerialChain;
use motiongen_types::{CacheCapacity, Cuboid, Vector3, WorldModel};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace};

/// 碰撞世界后端
///
/// 修改类方法取 `&mut self`，只在两次规划请求之间调用。
pub trait CollisionWorld: Send + Sync {
    /// 加载障碍物，必要时扩大缓存
    fn load(&mut self, world: &WorldModel) -> Result<(), BackendError>;

    /// 清空障碍物（保留容量）
    fn clear_cache(&mut self);

    /// 在现有容量内替换障碍物
    fn update(&mut self, world: &WorldModel) -> Result<(), BackendError>;

    /// 当前缓存容量
    fn capacity(&self) -> CacheCapacity;

    /// 重新分配缓存容量（不小于已加载的障碍物数量）
    fn reserve(&mut self, capacity: CacheCapacity) -> Result<(), BackendError>;

    /// 批量碰撞检查，返回与输入逐点对齐的结果
    ///
    /// 维度错误的路点按碰撞处理。
    fn is_in_collision(&self, waypoints: &[Vec<f64>]) -> Vec<bool>;

    /// 单个位形的碰撞代价（激活距离内的穿透量平方和，无接触时为 0）
    fn collision_cost(&self, q: &[f64]) -> f64;
}

/// 球体近似参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereModel {
    /// 球半径（米）
    pub radius: f64,
    /// 相邻球心间距上限（米）
    pub spacing: f64,
    /// 额外安全余量（米）
    pub buffer: f64,
    /// 代价激活距离（米）
    pub activation_distance: f64,
}

impl Default for SphereModel {
    fn default() -> Self {
        Self {
            radius: 0.04,
            spacing: 0.05,
            buffer: 0.0,
            activation_distance: 0.03,
        }
    }
}

/// 球体 vs OBB 碰撞世界
#[derive(Debug)]
pub struct SphereCollisionWorld {
    robot: Arc<SerialChain>,
    model: SphereModel,
    obstacles: Vec<Cuboid>,
    loaded: CacheCapacity,
    capacity: CacheCapacity,
}

impl SphereCollisionWorld {
    pub fn new(robot: Arc<SerialChain>, model: SphereModel) -> Self {
        Self {
            robot,
            model,
            obstacles: Vec::new(),
            loaded: CacheCapacity::default(),
            capacity: CacheCapacity::default(),
        }
    }

    /// 球体参数
    pub fn model(&self) -> &SphereModel {
        &self.model
    }

    /// 当前障碍物（OBB 形式）
    pub fn obstacles(&self) -> &[Cuboid] {
        &self.obstacles
    }

    /// 球心（世界坐标系）
    ///
    /// 基座到第一个关节的静止连杆不参与检查。
    pub fn sphere_centers(&self, q: &[f64]) -> Result<Vec<Vector3<f64>>, BackendError> {
        let points = self.robot.link_points(q)?;
        let mut centers = Vec::new();
        for pair in points[1..].windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = (b - a).norm();
            if length < 1e-9 {
                continue;
            }
            let n = (length / self.model.spacing).ceil() as usize;
            centers.extend((0..=n).map(|i| a + (b - a) * (i as f64 / n as f64)));
        }
        Ok(centers)
    }

    /// 所有球面到障碍物的最小有符号距离（无障碍物时为 +∞）
    pub fn clearance(&self, q: &[f64]) -> Result<f64, BackendError> {
        let centers = self.sphere_centers(q)?;
        Ok(centers
            .iter()
            .flat_map(|c| {
                self.obstacles
                    .iter()
                    .map(move |o| o.signed_distance(c) - self.model.radius)
            })
            .fold(f64::INFINITY, f64::min))
    }

    fn replace(&mut self, world: &WorldModel) {
        self.obstacles = world.to_obb_world().cuboids;
        self.loaded = world.cache_requirement();
    }
}

impl CollisionWorld for SphereCollisionWorld {
    fn load(&mut self, world: &WorldModel) -> Result<(), BackendError> {
        let required = world.cache_requirement();
        if !required.fits_in(&self.capacity) {
            debug!(?required, capacity = ?self.capacity, "Growing collision cache");
            self.capacity = self.capacity.max(required);
        }
        self.replace(world);
        Ok(())
    }

    fn clear_cache(&mut self) {
        self.obstacles.clear();
        self.loaded = CacheCapacity::default();
    }

    fn update(&mut self, world: &WorldModel) -> Result<(), BackendError> {
        let required = world.cache_requirement();
        if !required.fits_in(&self.capacity) {
            return Err(BackendError::CacheCapacityExceeded {
                required,
                capacity: self.capacity,
            });
        }
        self.replace(world);
        Ok(())
    }

    fn capacity(&self) -> CacheCapacity {
        self.capacity
    }

    fn reserve(&mut self, capacity: CacheCapacity) -> Result<(), BackendError> {
        self.capacity = capacity.max(self.loaded);
        trace!(capacity = ?self.capacity, "Collision cache reserved");
        Ok(())
    }

    fn is_in_collision(&self, waypoints: &[Vec<f64>]) -> Vec<bool> {
        waypoints
            .par_iter()
            .map(|q| match self.clearance(q) {
                Ok(d) => d < self.model.buffer,
                Err(_) => true,
            })
            .collect()
    }

    fn collision_cost(&self, q: &[f64]) -> f64 {
        let Ok(centers) = self.sphere_centers(q) else {
            return f64::INFINITY;
        };
        let reach = self.model.radius + self.model.buffer + self.model.activation_distance;
        centers
            .iter()
            .flat_map(|c| self.obstacles.iter().map(move |o| o.signed_distance(c)))
            .map(|d| {
                let penetration = (reach - d).max(0.0);
                penetration * penetration
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Kinematics;
    use motiongen_types::Pose;

    fn world_with_box_at(center: Vector3<f64>, size: f64) -> WorldModel {
        WorldModel::empty().with_cuboid(Cuboid::new(
            "box",
            [size; 3],
            Pose::from_translation(center.x, center.y, center.z),
        ))
    }

    fn setup() -> (Arc<SerialChain>, SphereCollisionWorld) {
        let robot = Arc::new(SerialChain::demo_arm());
        let world = SphereCollisionWorld::new(robot.clone(), SphereModel::default());
        (robot, world)
    }

    #[test]
    fn test_empty_world_is_free() {
        let (robot, world) = setup();
        let q = robot.retract_config().to_vec();
        assert_eq!(world.is_in_collision(&[q.clone(), vec![0.0; 6]]), vec![false, false]);
        assert_eq!(world.collision_cost(&q), 0.0);
        assert_eq!(world.clearance(&q).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_box_at_end_effector_collides() {
        let (robot, mut world) = setup();
        let q = robot.retract_config().to_vec();
        let ee = robot.forward(&q).unwrap().position;
        world.load(&world_with_box_at(ee, 0.1)).unwrap();

        assert_eq!(world.is_in_collision(&[q.clone()]), vec![true]);
        assert!(world.collision_cost(&q) > 0.0);
        // 竖直位形远离障碍物
        assert_eq!(world.is_in_collision(&[vec![0.0; 6]]), vec![false]);
    }

    #[test]
    fn test_cost_activates_before_contact() {
        let (robot, mut world) = setup();
        let q = robot.retract_config().to_vec();
        let ee = robot.forward(&q).unwrap().position;
        // 盒面距末端球面 0.02 m，小于激活距离 0.03 m
        let offset = 0.05 + 0.04 + 0.02;
        world
            .load(&world_with_box_at(ee + Vector3::new(0.0, offset, 0.0), 0.1))
            .unwrap();
        assert_eq!(world.is_in_collision(&[q.clone()]), vec![false]);
        assert!(world.collision_cost(&q) > 0.0);
    }

    #[test]
    fn test_wrong_dof_counts_as_collision() {
        let (_, world) = setup();
        assert_eq!(world.is_in_collision(&[vec![0.0; 3]]), vec![true]);
        assert_eq!(world.collision_cost(&[0.0; 3]), f64::INFINITY);
    }

    #[test]
    fn test_cache_capacity() {
        let (_, mut world) = setup();
        world.reserve(CacheCapacity::new(1, 0)).unwrap();
        assert_eq!(world.capacity(), CacheCapacity::new(1, 0));

        let one = world_with_box_at(Vector3::new(2.0, 0.0, 0.0), 0.1);
        let two = one
            .clone()
            .with_cuboid(Cuboid::new("b", [0.1; 3], Pose::from_translation(-2.0, 0.0, 0.0)));

        world.update(&one).unwrap();
        assert_eq!(world.obstacles().len(), 1);
        assert_eq!(
            world.update(&two),
            Err(BackendError::CacheCapacityExceeded {
                required: CacheCapacity::new(2, 0),
                capacity: CacheCapacity::new(1, 0),
            })
        );
        // 失败的 update 不改变已加载的障碍物
        assert_eq!(world.obstacles().len(), 1);

        world.load(&two).unwrap();
        assert_eq!(world.capacity(), CacheCapacity::new(2, 0));

        world.clear_cache();
        assert!(world.obstacles().is_empty());
        assert_eq!(world.capacity(), CacheCapacity::new(2, 0));
    }
}
