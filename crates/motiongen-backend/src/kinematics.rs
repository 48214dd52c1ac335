//! 运动学后端接口
//!
//! 正运动学逐个求值；逆运动学必须是批量调用：一次调用返回 `seed_count` 个
//! 候选解及逐个收敛标志和残差，所有输出序列按下标对齐。

use crate::error::BackendError;
use motiongen_types::{JointLimits, Pose};
use nalgebra::{DMatrix, DVector, Vector6};

/// 批量 IK 请求
#[derive(Debug, Clone, PartialEq)]
pub struct IkRequest {
    /// 目标末端位姿
    pub goal: Pose,
    /// 候选解数量
    pub seed_count: usize,
    /// 第 0 个种子的初值（通常是起始关节角），`None` 时用收回位形
    pub seed_hint: Option<Vec<f64>>,
    /// 收敛位置阈值（米）
    pub position_threshold: f64,
    /// 收敛姿态阈值（弧度）
    pub rotation_threshold: f64,
}

/// 批量 IK 结果（所有字段长度均为 `seed_count`）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IkBatch {
    pub solutions: Vec<Vec<f64>>,
    pub converged: Vec<bool>,
    pub position_error: Vec<f64>,
    pub rotation_error: Vec<f64>,
}

impl IkBatch {
    /// 候选数
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// 收敛的候选数
    pub fn converged_count(&self) -> usize {
        self.converged.iter().filter(|c| **c).count()
    }

    /// 校验输出形状
    pub fn check_shape(&self, seed_count: usize, dof: usize) -> Result<(), BackendError> {
        for len in [
            self.solutions.len(),
            self.converged.len(),
            self.position_error.len(),
            self.rotation_error.len(),
        ] {
            if len != seed_count {
                return Err(BackendError::ShapeMismatch {
                    stage: "ik",
                    expected: seed_count,
                    actual: len,
                });
            }
        }
        if let Some(bad) = self.solutions.iter().find(|q| q.len() != dof) {
            return Err(BackendError::DofMismatch {
                expected: dof,
                actual: bad.len(),
            });
        }
        Ok(())
    }
}

/// 运动学后端
///
/// 所有方法取 `&self`；随机数等内部状态由实现自行加锁，
/// 以便优化器在并行计算中共享同一实例。
pub trait Kinematics: Send + Sync {
    /// 主动关节数
    fn dof(&self) -> usize;

    /// 关节名称
    fn joint_names(&self) -> &[String];

    /// 关节限位
    fn joint_limits(&self) -> &JointLimits;

    /// 收回位形（预热和默认种子使用）
    fn retract_config(&self) -> &[f64];

    /// 正运动学：关节角 → 末端位姿
    fn forward(&self, q: &[f64]) -> Result<Pose, BackendError>;

    /// 批量逆运动学
    fn batched_ik(&self, request: &IkRequest) -> Result<IkBatch, BackendError>;

    /// 重置随机种子，使后续调用可复现
    fn reset_seed(&self) {}
}

/// 位姿误差旋量 `[dp; dθ]`（世界坐标系）
pub fn pose_error_twist(current: &Pose, goal: &Pose) -> Vector6<f64> {
    let dp = goal.position - current.position;
    let dr = (goal.quaternion * current.quaternion.inverse()).scaled_axis();
    Vector6::new(dp.x, dp.y, dp.z, dr.x, dr.y, dr.z)
}

/// 前向差分数值雅可比（6 × dof）
pub fn numeric_jacobian(
    kinematics: &dyn Kinematics,
    q: &[f64],
    current: &Pose,
) -> Result<DMatrix<f64>, BackendError> {
    const H: f64 = 1e-6;

    let dof = q.len();
    let mut jacobian = DMatrix::<f64>::zeros(6, dof);
    let mut perturbed = q.to_vec();
    for i in 0..dof {
        perturbed[i] = q[i] + H;
        let pose = kinematics.forward(&perturbed)?;
        let column = pose_error_twist(current, &pose) / H;
        for r in 0..6 {
            jacobian[(r, i)] = column[r];
        }
        perturbed[i] = q[i];
    }
    Ok(jacobian)
}

/// 一步阻尼最小二乘：`dq = Jᵀ (J Jᵀ + λ² I)⁻¹ e`
///
/// 单关节步长被限制在 `max_step` 以内，结果裁剪到关节限位。
pub fn dls_step(
    kinematics: &dyn Kinematics,
    q: &[f64],
    goal: &Pose,
    damping: f64,
    max_step: f64,
) -> Result<Vec<f64>, BackendError> {
    let current = kinematics.forward(q)?;
    let error = pose_error_twist(&current, goal);
    let jacobian = numeric_jacobian(kinematics, q, &current)?;

    let jjt = &jacobian * jacobian.transpose() + DMatrix::<f64>::identity(6, 6) * damping * damping;
    let solved = jjt
        .cholesky()
        .ok_or_else(|| BackendError::Numerical("damped Jacobian not positive definite".into()))?
        .solve(&DVector::from_column_slice(error.as_slice()));
    let dq = jacobian.transpose() * solved;

    let largest = dq.amax();
    let scale = if largest > max_step {
        max_step / largest
    } else {
        1.0
    };

    let mut next: Vec<f64> = q.iter().zip(dq.iter()).map(|(v, d)| v + d * scale).collect();
    if next.iter().any(|v| !v.is_finite()) {
        return Err(BackendError::Numerical("non-finite IK step".into()));
    }
    kinematics.joint_limits().clamp(&mut next);
    Ok(next)
}
