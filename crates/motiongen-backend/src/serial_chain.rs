//! 串联机械臂参考运动学
//!
//! 每个关节由「父坐标系 → 关节坐标系」的固定偏移和一个转轴描述，末端再接
//! 一个固定的工具偏移。逆运动学是批量阻尼最小二乘：第 0 个种子取请求里的
//! 初值（或收回位形），其余种子在限位内均匀采样，然后用 rayon 并行迭代。
//!
//! IK 只看位姿，不考虑碰撞；碰撞由后续阶段处理。

use crate::error::BackendError;
use crate::kinematics::{IkBatch, IkRequest, Kinematics, dls_step};
use motiongen_types::{JointLimits, Pose, Vector3};
use nalgebra::{Unit, UnitQuaternion};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::trace;

/// 旋转关节
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    /// 关节名称
    pub name: String,
    /// 父坐标系到关节坐标系的固定偏移
    pub origin: Pose,
    /// 转轴（关节坐标系，单位向量）
    pub axis: Unit<Vector3<f64>>,
}

impl RevoluteJoint {
    pub fn new(name: impl Into<String>, origin: Vector3<f64>, axis: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            origin: Pose::new(origin, UnitQuaternion::identity()),
            axis: Unit::new_normalize(axis),
        }
    }
}

/// 阻尼最小二乘 IK 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSettings {
    /// 最大迭代次数
    pub max_iterations: usize,
    /// 阻尼系数 λ
    pub damping: f64,
    /// 单步单关节最大增量（rad）
    pub max_step: f64,
    /// 迭代终止阈值相对于收敛阈值的比例
    pub tolerance_scale: f64,
}

impl Default for IkSettings {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            damping: 0.05,
            max_step: 0.2,
            tolerance_scale: 0.1,
        }
    }
}

/// 串联机械臂
pub struct SerialChain {
    joints: Vec<RevoluteJoint>,
    tool: Pose,
    names: Vec<String>,
    limits: JointLimits,
    retract: Vec<f64>,
    settings: IkSettings,
    seed: u64,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for SerialChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChain")
            .field("joints", &self.names)
            .field("tool", &self.tool)
            .field("seed", &self.seed)
            .finish()
    }
}

impl SerialChain {
    /// 构造串联链
    ///
    /// `limits`/`retract` 的维度必须与关节数一致。
    pub fn new(
        joints: Vec<RevoluteJoint>,
        tool: Pose,
        limits: JointLimits,
        retract: Vec<f64>,
    ) -> Result<Self, BackendError> {
        let dof = joints.len();
        for actual in [
            limits.lower.len(),
            limits.upper.len(),
            limits.velocity.len(),
            limits.acceleration.len(),
            limits.jerk.len(),
            retract.len(),
        ] {
            if actual != dof {
                return Err(BackendError::DofMismatch {
                    expected: dof,
                    actual,
                });
            }
        }
        let names = joints.iter().map(|j| j.name.clone()).collect();
        Ok(Self {
            joints,
            tool,
            names,
            limits,
            retract,
            settings: IkSettings::default(),
            seed: 0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        })
    }

    /// 6 自由度演示机械臂（肩高 0.3 m，大臂 0.4 m，小臂 0.35 m）
    pub fn demo_arm() -> Self {
        let z = Vector3::z();
        let y = Vector3::y();
        let joints = vec![
            RevoluteJoint::new("shoulder_pan", Vector3::new(0.0, 0.0, 0.3), z),
            RevoluteJoint::new("shoulder_lift", Vector3::zeros(), y),
            RevoluteJoint::new("elbow", Vector3::new(0.0, 0.0, 0.4), y),
            RevoluteJoint::new("wrist_roll", Vector3::new(0.0, 0.0, 0.35), z),
            RevoluteJoint::new("wrist_pitch", Vector3::zeros(), y),
            RevoluteJoint::new("flange_roll", Vector3::new(0.0, 0.0, 0.1), z),
        ];
        let limits = JointLimits {
            lower: vec![-2.9, -2.0, -2.6, -2.9, -2.0, -2.9],
            upper: vec![2.9, 2.0, 2.6, 2.9, 2.0, 2.9],
            velocity: vec![2.0; 6],
            acceleration: vec![10.0; 6],
            jerk: vec![200.0; 6],
        };
        let names: Vec<String> = joints.iter().map(|j| j.name.clone()).collect();
        Self {
            joints,
            tool: Pose::from_translation(0.0, 0.0, 0.1),
            names,
            limits,
            retract: vec![0.0, 0.5, 1.0, 0.0, 1.0, 0.0],
            settings: IkSettings::default(),
            seed: 0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// 设置 IK 参数
    pub fn with_ik_settings(mut self, settings: IkSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 设置随机种子
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn check_dof(&self, q: &[f64]) -> Result<(), BackendError> {
        if q.len() != self.joints.len() {
            return Err(BackendError::DofMismatch {
                expected: self.joints.len(),
                actual: q.len(),
            });
        }
        Ok(())
    }

    /// 各关节坐标系原点与工具点（世界坐标系），共 `dof + 2` 个点，首点为基座原点
    ///
    /// 碰撞球沿相邻点之间的连杆布置。
    pub fn link_points(&self, q: &[f64]) -> Result<Vec<Vector3<f64>>, BackendError> {
        self.check_dof(q)?;
        let mut frame = Pose::identity();
        let mut points = Vec::with_capacity(self.joints.len() + 2);
        points.push(frame.position);
        for (joint, angle) in self.joints.iter().zip(q) {
            frame = frame * joint.origin * Self::rotation(joint, *angle);
            points.push(frame.position);
        }
        points.push((frame * self.tool).position);
        Ok(points)
    }

    fn rotation(joint: &RevoluteJoint, angle: f64) -> Pose {
        Pose::new(
            Vector3::zeros(),
            UnitQuaternion::from_axis_angle(&joint.axis, angle),
        )
    }

    /// 单个种子的 DLS 迭代
    fn solve_one(&self, seed: Vec<f64>, request: &IkRequest) -> (Vec<f64>, bool, f64, f64) {
        let stop_pos = request.position_threshold * self.settings.tolerance_scale;
        let stop_rot = request.rotation_threshold * self.settings.tolerance_scale;

        let mut q = seed;
        let mut errors = self.errors(&q, &request.goal);
        for _ in 0..self.settings.max_iterations {
            if errors.0 <= stop_pos && errors.1 <= stop_rot {
                break;
            }
            match dls_step(
                self,
                &q,
                &request.goal,
                self.settings.damping,
                self.settings.max_step,
            ) {
                Ok(next) => {
                    q = next;
                    errors = self.errors(&q, &request.goal);
                },
                Err(_) => break,
            }
        }

        let converged =
            errors.0 <= request.position_threshold && errors.1 <= request.rotation_threshold;
        (q, converged, errors.0, errors.1)
    }

    fn errors(&self, q: &[f64], goal: &Pose) -> (f64, f64) {
        match self.forward(q) {
            Ok(pose) => pose.distance(goal),
            Err(_) => (f64::INFINITY, f64::INFINITY),
        }
    }

    fn sample_seeds(&self, request: &IkRequest) -> Result<Vec<Vec<f64>>, BackendError> {
        let first = match &request.seed_hint {
            Some(hint) => {
                self.check_dof(hint)?;
                let mut hint = hint.clone();
                self.limits.clamp(&mut hint);
                hint
            },
            None => self.retract.clone(),
        };

        let mut rng = self.rng.lock();
        let mut seeds = Vec::with_capacity(request.seed_count);
        if request.seed_count > 0 {
            seeds.push(first);
        }
        while seeds.len() < request.seed_count {
            seeds.push(
                self.limits
                    .ranges()
                    .map(|(lo, hi)| rng.gen_range(lo..=hi))
                    .collect(),
            );
        }
        Ok(seeds)
    }
}

impl Kinematics for SerialChain {
    fn dof(&self) -> usize {
        self.joints.len()
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
        self.check_dof(q)?;
        let mut frame = Pose::identity();
        for (joint, angle) in self.joints.iter().zip(q) {
            frame = frame * joint.origin * Self::rotation(joint, *angle);
        }
        Ok(frame * self.tool)
    }

    fn batched_ik(&self, request: &IkRequest) -> Result<IkBatch, BackendError> {
        let seeds = self.sample_seeds(request)?;
        trace!(seeds = seeds.len(), "batched IK");

        let results: Vec<_> = seeds
            .into_par_iter()
            .map(|seed| self.solve_one(seed, request))
            .collect();

        let mut batch = IkBatch::default();
        for (q, converged, pos, rot) in results {
            batch.solutions.push(q);
            batch.converged.push(converged);
            batch.position_error.push(pos);
            batch.rotation_error.push(rot);
        }
        Ok(batch)
    }

    fn reset_seed(&self) {
        *self.rng.lock() = StdRng::seed_from_u64(self.seed);
    }
}
