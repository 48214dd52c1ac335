//! 关节状态与关节限位

use crate::error::TypesError;

/// 关节状态
///
/// 位置必选，速度/加速度/加加速度可选。每个求解阶段都创建新的实例，
/// 传入求解器后不再修改。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointState {
    /// 关节名称（与 position 对齐）
    pub joint_names: Vec<String>,
    /// 关节位置（弧度）
    pub position: Vec<f64>,
    /// 关节速度（rad/s）
    pub velocity: Option<Vec<f64>>,
    /// 关节加速度（rad/s²）
    pub acceleration: Option<Vec<f64>>,
    /// 关节加加速度（rad/s³）
    pub jerk: Option<Vec<f64>>,
}

impl JointState {
    /// 仅由位置构造
    pub fn from_position(joint_names: Vec<String>, position: Vec<f64>) -> Self {
        Self {
            joint_names,
            position,
            velocity: None,
            acceleration: None,
            jerk: None,
        }
    }

    /// 关节数
    pub fn dof(&self) -> usize {
        self.position.len()
    }

    /// 校验关节数与名称数一致，并等于 `expected`
    pub fn check_dof(&self, expected: usize) -> Result<(), TypesError> {
        if self.position.len() != expected {
            return Err(TypesError::DofMismatch {
                expected,
                actual: self.position.len(),
            });
        }
        if !self.joint_names.is_empty() && self.joint_names.len() != expected {
            return Err(TypesError::DofMismatch {
                expected,
                actual: self.joint_names.len(),
            });
        }
        for derivative in [&self.velocity, &self.acceleration, &self.jerk]
            .into_iter()
            .flatten()
        {
            if derivative.len() != expected {
                return Err(TypesError::DofMismatch {
                    expected,
                    actual: derivative.len(),
                });
            }
        }
        Ok(())
    }

    /// 所有已填充的字段是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && [&self.velocity, &self.acceleration, &self.jerk]
                .into_iter()
                .flatten()
                .all(|d| d.iter().all(|v| v.is_finite()))
    }
}

/// 关节限位
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointLimits {
    /// 位置下限（rad）
    pub lower: Vec<f64>,
    /// 位置上限（rad）
    pub upper: Vec<f64>,
    /// 最大速度（rad/s）
    pub velocity: Vec<f64>,
    /// 最大加速度（rad/s²）
    pub acceleration: Vec<f64>,
    /// 最大加加速度（rad/s³）
    pub jerk: Vec<f64>,
}

impl JointLimits {
    /// 关节数
    pub fn dof(&self) -> usize {
        self.lower.len()
    }

    /// 位置是否在限位内（闭区间）
    pub fn contains(&self, q: &[f64]) -> bool {
        q.len() == self.lower.len()
            && q.iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// 将位置裁剪到限位内
    pub fn clamp(&self, q: &mut [f64]) {
        for (v, (lo, hi)) in q.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.clamp(*lo, *hi);
        }
    }

    /// 越界量之和（在限位内为 0）
    pub fn violation(&self, q: &[f64]) -> f64 {
        q.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(v, (lo, hi))| (lo - v).max(0.0) + (v - hi).max(0.0))
            .sum()
    }

    /// 随机采样辅助：每个关节的 `(lower, upper)`
    pub fn ranges(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lower.iter().copied().zip(self.upper.iter().copied())
    }
}
