//! 笛卡尔位姿
//!
//! `Pose` = 3D 位置 + 单位四元数姿态。四元数在构造时归一化，之后不会被修改，
//! 因此所有运算结果都保持归一化。
//!
//! # 约定
//!
//! - 列表形式为 `[x, y, z, qw, qx, qy, qz]`（w 在前）
//! - `a * b` 表示先 `b` 后 `a` 的刚体变换复合（与 `Isometry3` 一致）
//! - 姿态误差用测地角（弧度）表示

use crate::error::TypesError;
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use std::ops::Mul;

/// 末端执行器位姿
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// 位置（米）
    pub position: Vector3<f64>,
    /// 姿态（单位四元数）
    pub quaternion: UnitQuaternion<f64>,
}

impl Pose {
    /// 由位置和姿态构造
    pub fn new(position: Vector3<f64>, quaternion: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            quaternion,
        }
    }

    /// 单位位姿
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// 纯平移位姿
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// 从 `[x, y, z, qw, qx, qy, qz]` 构造
    ///
    /// 四元数会被归一化；零范数四元数返回错误。
    pub fn from_list(values: &[f64]) -> Result<Self, TypesError> {
        if values.len() != 7 {
            return Err(TypesError::InvalidPoseList(values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TypesError::NonFinite("pose"));
        }

        let position = Vector3::new(values[0], values[1], values[2]);
        let raw = Quaternion::new(values[3], values[4], values[5], values[6]);
        let quaternion =
            UnitQuaternion::try_new(raw, f64::EPSILON).ok_or(TypesError::DegenerateQuaternion)?;

        Ok(Self::new(position, quaternion))
    }

    /// 转换为 `[x, y, z, qw, qx, qy, qz]`
    pub fn to_list(&self) -> [f64; 7] {
        let q = self.quaternion.quaternion();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.w,
            q.i,
            q.j,
            q.k,
        ]
    }

    /// 转换为 nalgebra 刚体变换
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.quaternion)
    }

    /// 逆变换
    pub fn inverse(&self) -> Self {
        let inv_rot = self.quaternion.inverse();
        Self::new(-(inv_rot * self.position), inv_rot)
    }

    /// 位姿复合：`self * other`
    pub fn multiply(&self, other: &Pose) -> Self {
        Self::new(
            self.position + self.quaternion * other.position,
            self.quaternion * other.quaternion,
        )
    }

    /// 将局部坐标系下的点变换到世界坐标系
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.quaternion * point
    }

    /// 将世界坐标系下的点变换到局部坐标系
    pub fn inverse_transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion.inverse() * (point - self.position)
    }

    /// 在世界坐标系中平移（姿态不变）
    pub fn translated(&self, offset: Vector3<f64>) -> Self {
        Self::new(self.position + offset, self.quaternion)
    }

    /// 位置距离（米）
    pub fn position_distance(&self, other: &Pose) -> f64 {
        (self.position - other.position).norm()
    }

    /// 姿态测地距离（弧度，范围 [0, π]）
    pub fn angular_distance(&self, other: &Pose) -> f64 {
        self.quaternion.angle_to(&other.quaternion)
    }

    /// `(位置误差, 姿态误差)`
    pub fn distance(&self, other: &Pose) -> (f64, f64) {
        (self.position_distance(other), self.angular_distance(other))
    }

    /// 位置和姿态是否都为有限值
    pub fn is_finite(&self) -> bool {
        self.to_list().iter().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.multiply(&rhs)
    }
}

impl<'a> Mul<&'a Pose> for &'a Pose {
    type Output = Pose;

    fn mul(self, rhs: &'a Pose) -> Pose {
        self.multiply(rhs)
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(iso: Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }
}

impl From<Pose> for Isometry3<f64> {
    fn from(pose: Pose) -> Self {
        pose.to_isometry()
    }
}

impl From<Pose> for Point3<f64> {
    fn from(pose: Pose) -> Self {
        Point3::from(pose.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_from_list_normalizes_quaternion() {
        let pose = Pose::from_list(&[0.1, 0.2, 0.3, 2.0, 0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(pose.quaternion.quaternion().norm(), 1.0, epsilon = 1e-12);
        assert_eq!(pose.to_list(), [0.1, 0.2, 0.3, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_from_list_rejects_bad_input() {
        assert_eq!(
            Pose::from_list(&[0.0; 3]),
            Err(TypesError::InvalidPoseList(3))
        );
        assert_eq!(
            Pose::from_list(&[0.0; 7]),
            Err(TypesError::DegenerateQuaternion)
        );
        assert_eq!(
            Pose::from_list(&[f64::NAN, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
            Err(TypesError::NonFinite("pose"))
        );
    }

    #[test]
    fn test_inverse_and_multiply() {
        let pose = Pose::new(
            Vector3::new(0.5, -0.2, 0.1),
            UnitQuaternion::from_euler_angles(0.1, 0.4, -0.3),
        );
        let ident = pose * pose.inverse();
        assert_relative_eq!(ident.position, Vector3::zeros(), epsilon = 1e-12);
        assert!(ident.angular_distance(&Pose::identity()) < 1e-6);
    }

    #[test]
    fn test_multiply_matches_isometry() {
        let a = Pose::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        );
        let b = Pose::from_translation(1.0, 0.0, 0.0);
        let composed = &a * &b;
        let expected: Pose = (a.to_isometry() * b.to_isometry()).into();
        assert_relative_eq!(composed.position, expected.position, epsilon = 1e-12);
        // 绕 z 旋转 90°，b 的 x 平移变为 y 平移
        assert_relative_eq!(composed.position, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_angular_distance() {
        let a = Pose::identity();
        let b = Pose::new(
            Vector3::zeros(),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.3),
        );
        assert_relative_eq!(a.angular_distance(&b), 0.3, epsilon = 1e-12);
        assert_relative_eq!(b.angular_distance(&a), 0.3, epsilon = 1e-12);

        let (pos, rot) = a.translated(Vector3::new(0.0, 0.03, 0.04)).distance(&b);
        assert_relative_eq!(pos, 0.05, epsilon = 1e-12);
        assert_relative_eq!(rot, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point_roundtrip() {
        let pose = Pose::new(
            Vector3::new(0.3, 0.1, -0.2),
            UnitQuaternion::from_euler_angles(0.2, -0.1, 0.7),
        );
        let p = Vector3::new(0.05, 0.02, 0.9);
        let back = pose.inverse_transform_point(&pose.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-12);
    }
}
