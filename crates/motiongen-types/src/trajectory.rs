//! 关节空间轨迹
//!
//! 固定时间步长 `dt` 的离散轨迹。速度/加速度/加加速度由后向差分得到，
//! 首个点的导数为 0（起止静止）。
//!
//! # 重采样
//!
//! - [`JointTrajectory::linear`]: 起点到终点的直线种子
//! - [`JointTrajectory::from_path`]: 按关节空间弧长把离散路径重采样为固定点数
//! - [`JointTrajectory::interpolate`]: 分段三次 Hermite 插值到更细的 `interpolation_dt`
//!
//! 三次插值沿用 `p(t) = a0 + a1*t + a2*t² + a3*t³` 的归一化时间形式：
//! ```text
//! a0 = p0
//! a1 = v0
//! a2 = 3*(p1 - p0) - 2*v0 - v1
//! a3 = -2*(p1 - p0) + v0 + v1
//! ```

use crate::error::TypesError;
use crate::state::{JointLimits, JointState};

/// 三次样条系数（归一化时间 t ∈ [0, 1]）
#[derive(Debug, Clone, Copy)]
struct CubicCoeffs {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl CubicCoeffs {
    /// 由两端位置和（归一化）速度构造
    fn hermite(p0: f64, v0: f64, p1: f64, v1: f64) -> Self {
        Self {
            a0: p0,
            a1: v0,
            a2: 3.0 * (p1 - p0) - 2.0 * v0 - v1,
            a3: -2.0 * (p1 - p0) + v0 + v1,
        }
    }

    fn position(&self, t: f64) -> f64 {
        self.a0 + self.a1 * t + self.a2 * t * t + self.a3 * t * t * t
    }
}

/// 关节空间轨迹
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointTrajectory {
    /// 关节名称
    pub joint_names: Vec<String>,
    /// 相邻点时间间隔（秒）
    pub dt: f64,
    /// 位置序列 `[timestep][joint]`
    pub position: Vec<Vec<f64>>,
    /// 速度序列
    pub velocity: Vec<Vec<f64>>,
    /// 加速度序列
    pub acceleration: Vec<Vec<f64>>,
    /// 加加速度序列
    pub jerk: Vec<Vec<f64>>,
}

impl JointTrajectory {
    /// 由位置序列构造并计算导数
    pub fn new(
        joint_names: Vec<String>,
        dt: f64,
        position: Vec<Vec<f64>>,
    ) -> Result<Self, TypesError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TypesError::InvalidDt(dt));
        }
        let first = position.first().ok_or(TypesError::EmptyTrajectory)?;
        let dof = first.len();
        if let Some(bad) = position.iter().find(|p| p.len() != dof) {
            return Err(TypesError::DofMismatch {
                expected: dof,
                actual: bad.len(),
            });
        }
        if position.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TypesError::NonFinite("trajectory position"));
        }

        let mut traj = Self {
            joint_names,
            dt,
            position,
            velocity: Vec::new(),
            acceleration: Vec::new(),
            jerk: Vec::new(),
        };
        traj.update_derivatives();
        Ok(traj)
    }

    /// 起点到终点的直线插值（`n` 个点，含两端）
    pub fn linear(
        joint_names: Vec<String>,
        start: &[f64],
        goal: &[f64],
        n: usize,
        dt: f64,
    ) -> Result<Self, TypesError> {
        if start.len() != goal.len() {
            return Err(TypesError::DofMismatch {
                expected: start.len(),
                actual: goal.len(),
            });
        }
        let n = n.max(1);
        let position = (0..n)
            .map(|i| {
                let s = if n == 1 {
                    1.0
                } else {
                    i as f64 / (n - 1) as f64
                };
                start
                    .iter()
                    .zip(goal)
                    .map(|(a, b)| a + (b - a) * s)
                    .collect()
            })
            .collect();
        Self::new(joint_names, dt, position)
    }

    /// 将离散路径按关节空间弧长重采样为 `n` 个点
    ///
    /// 图搜索得到的路径点数不定，优化器需要固定点数的种子。
    pub fn from_path(
        joint_names: Vec<String>,
        path: &[Vec<f64>],
        n: usize,
        dt: f64,
    ) -> Result<Self, TypesError> {
        let first = path.first().ok_or(TypesError::EmptyTrajectory)?;
        let n = n.max(1);

        let mut cumulative = Vec::with_capacity(path.len());
        cumulative.push(0.0);
        for pair in path.windows(2) {
            let seg = joint_distance(&pair[0], &pair[1]);
            let last = cumulative.last().copied().unwrap_or(0.0);
            cumulative.push(last + seg);
        }
        let total = cumulative.last().copied().unwrap_or(0.0);

        if total <= f64::EPSILON || path.len() == 1 {
            return Self::new(joint_names, dt, vec![first.clone(); n]);
        }

        let mut position = Vec::with_capacity(n);
        let mut segment = 0;
        for k in 0..n {
            let s = if n == 1 {
                total
            } else {
                total * k as f64 / (n - 1) as f64
            };
            while segment + 1 < path.len() - 1 && cumulative[segment + 1] < s {
                segment += 1;
            }
            let seg_len = cumulative[segment + 1] - cumulative[segment];
            let alpha = if seg_len > 0.0 {
                ((s - cumulative[segment]) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let a = &path[segment];
            let b = &path[segment + 1];
            if alpha >= 1.0 {
                position.push(b.clone());
            } else {
                position.push(a.iter().zip(b).map(|(x, y)| x + (y - x) * alpha).collect());
            }
        }
        Self::new(joint_names, dt, position)
    }

    /// 点数
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// 是否为空（构造保证非空）
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// 关节数
    pub fn dof(&self) -> usize {
        self.position.first().map_or(0, Vec::len)
    }

    /// 起点位置
    pub fn first_position(&self) -> &[f64] {
        self.position.first().map_or(&[], Vec::as_slice)
    }

    /// 终点位置
    pub fn last_position(&self) -> &[f64] {
        self.position.last().map_or(&[], Vec::as_slice)
    }

    /// 轨迹总时长（秒）
    pub fn motion_time(&self) -> f64 {
        self.dt * self.len().saturating_sub(1) as f64
    }

    /// 第 `i` 个点的完整关节状态
    pub fn state(&self, i: usize) -> Option<JointState> {
        let position = self.position.get(i)?.clone();
        Some(JointState {
            joint_names: self.joint_names.clone(),
            position,
            velocity: self.velocity.get(i).cloned(),
            acceleration: self.acceleration.get(i).cloned(),
            jerk: self.jerk.get(i).cloned(),
        })
    }

    /// 以新的 `dt` 重新计算导数（位置不变）
    pub fn with_dt(&self, dt: f64) -> Result<Self, TypesError> {
        Self::new(self.joint_names.clone(), dt, self.position.clone())
    }

    /// 满足速度/加速度/加加速度限位的最小 `dt`
    ///
    /// 导数随 `dt` 的缩放关系：`v ∝ 1/dt`、`a ∝ 1/dt²`、`j ∝ 1/dt³`。
    pub fn min_feasible_dt(&self, limits: &JointLimits) -> f64 {
        let ratio = |series: &[Vec<f64>], bound: &[f64]| -> f64 {
            series
                .iter()
                .flat_map(|row| row.iter().zip(bound).map(|(v, b)| v.abs() / b.max(1e-9)))
                .fold(0.0, f64::max)
        };

        let v = ratio(&self.velocity, &limits.velocity);
        let a = ratio(&self.acceleration, &limits.acceleration).sqrt();
        let j = ratio(&self.jerk, &limits.jerk).cbrt();
        self.dt * v.max(a).max(j)
    }

    /// 分段三次 Hermite 插值到 `interpolation_dt`
    ///
    /// 结果点数上限为 `max_steps`；超过时放大步长使整条轨迹恰好放得下，
    /// 保证插值结果总是到达终点。
    pub fn interpolate(&self, interpolation_dt: f64, max_steps: usize) -> Result<Self, TypesError> {
        if !(interpolation_dt.is_finite() && interpolation_dt > 0.0) {
            return Err(TypesError::InvalidDt(interpolation_dt));
        }
        let total = self.motion_time();
        if self.len() < 2 || total <= 0.0 {
            return Self::new(self.joint_names.clone(), interpolation_dt, self.position.clone());
        }

        let max_steps = max_steps.max(2);
        let mut step_dt = interpolation_dt;
        let mut steps = (total / step_dt).ceil() as usize + 1;
        if steps > max_steps {
            step_dt = total / (max_steps - 1) as f64;
            steps = max_steps;
        }

        let tangents = self.normalized_tangents();
        let last_segment = self.len() - 2;
        let position = (0..steps)
            .map(|k| {
                let t = (k as f64 * step_dt).min(total);
                let u = t / self.dt;
                let segment = (u.floor() as usize).min(last_segment);
                let local = (u - segment as f64).clamp(0.0, 1.0);
                (0..self.dof())
                    .map(|j| {
                        CubicCoeffs::hermite(
                            self.position[segment][j],
                            tangents[segment][j],
                            self.position[segment + 1][j],
                            tangents[segment + 1][j],
                        )
                        .position(local)
                    })
                    .collect()
            })
            .collect();

        Self::new(self.joint_names.clone(), step_dt, position)
    }

    /// 每个点的归一化切线（中心差分，两端为 0）
    fn normalized_tangents(&self) -> Vec<Vec<f64>> {
        let n = self.len();
        (0..n)
            .map(|i| {
                if i == 0 || i + 1 == n {
                    vec![0.0; self.dof()]
                } else {
                    self.position[i + 1]
                        .iter()
                        .zip(&self.position[i - 1])
                        .map(|(next, prev)| 0.5 * (next - prev))
                        .collect()
                }
            })
            .collect()
    }

    fn update_derivatives(&mut self) {
        self.velocity = backward_difference(&self.position, self.dt);
        self.acceleration = backward_difference(&self.velocity, self.dt);
        self.jerk = backward_difference(&self.acceleration, self.dt);
    }
}

/// 后向差分，首个点为 0
fn backward_difference(series: &[Vec<f64>], dt: f64) -> Vec<Vec<f64>> {
    let dof = series.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(series.len());
    if !series.is_empty() {
        out.push(vec![0.0; dof]);
    }
    for pair in series.windows(2) {
        out.push(
            pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(b, a)| (b - a) / dt)
                .collect(),
        );
    }
    out
}

/// 关节空间欧氏距离
pub fn joint_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names() -> Vec<String> {
        vec!["j1".to_string(), "j2".to_string()]
    }

    #[test]
    fn test_cubic_hermite_boundaries() {
        let coeffs = CubicCoeffs::hermite(0.0, 0.0, 1.0, 0.0);
        assert!((coeffs.position(0.0) - 0.0).abs() < 1e-10);
        assert!((coeffs.position(1.0) - 1.0).abs() < 1e-10);
        assert!((coeffs.position(0.5) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_new_rejects_invalid() {
        assert_eq!(
            JointTrajectory::new(names(), 0.0, vec![vec![0.0, 0.0]]),
            Err(TypesError::InvalidDt(0.0))
        );
        assert_eq!(
            JointTrajectory::new(names(), 0.1, vec![]),
            Err(TypesError::EmptyTrajectory)
        );
        assert_eq!(
            JointTrajectory::new(names(), 0.1, vec![vec![0.0, 0.0], vec![0.0]]),
            Err(TypesError::DofMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_linear_and_derivatives() {
        let traj = JointTrajectory::linear(names(), &[0.0, 0.0], &[1.0, -1.0], 5, 0.5).unwrap();
        assert_eq!(traj.len(), 5);
        assert_eq!(traj.first_position(), &[0.0, 0.0]);
        assert_eq!(traj.last_position(), &[1.0, -1.0]);
        assert_relative_eq!(traj.motion_time(), 2.0);

        // 匀速：第二个点起速度恒定
        assert_eq!(traj.velocity[0], vec![0.0, 0.0]);
        assert_relative_eq!(traj.velocity[2][0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(traj.velocity[2][1], -0.5, epsilon = 1e-12);
        assert_relative_eq!(traj.acceleration[3][0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_path_resamples_by_arc_length() {
        let path = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let traj = JointTrajectory::from_path(names(), &path, 5, 0.1).unwrap();
        assert_eq!(traj.len(), 5);
        assert_eq!(traj.first_position(), &[0.0, 0.0]);
        assert_relative_eq!(traj.position[2][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(traj.position[2][1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(traj.position[3][1], 0.5, epsilon = 1e-12);
        assert_eq!(traj.last_position(), &[1.0, 1.0]);
    }

    #[test]
    fn test_from_path_degenerate() {
        let path = vec![vec![0.3, 0.3]];
        let traj = JointTrajectory::from_path(names(), &path, 4, 0.1).unwrap();
        assert_eq!(traj.len(), 4);
        assert!(traj.position.iter().all(|p| p == &vec![0.3, 0.3]));
    }

    #[test]
    fn test_min_feasible_dt_scales_velocity() {
        let traj = JointTrajectory::linear(names(), &[0.0, 0.0], &[1.0, 0.0], 11, 0.01).unwrap();
        let limits = JointLimits {
            lower: vec![-3.0; 2],
            upper: vec![3.0; 2],
            velocity: vec![1.0; 2],
            acceleration: vec![1.0e9; 2],
            jerk: vec![1.0e12; 2],
        };
        // 每步 0.1 rad，速度限位 1 rad/s -> dt >= 0.1
        let dt = traj.min_feasible_dt(&limits);
        assert_relative_eq!(dt, 0.1, epsilon = 1e-9);
        let scaled = traj.with_dt(dt).unwrap();
        assert!(scaled.velocity.iter().flatten().all(|v| v.abs() <= 1.0 + 1e-9));
    }

    #[test]
    fn test_interpolate_hits_endpoints() {
        let traj = JointTrajectory::linear(names(), &[0.0, 0.0], &[1.0, 2.0], 4, 0.25).unwrap();
        let fine = traj.interpolate(0.125, 1000).unwrap();
        assert_eq!(fine.len(), 7);
        assert_relative_eq!(fine.dt, 0.125);
        assert_eq!(fine.first_position(), &[0.0, 0.0]);
        assert_relative_eq!(fine.last_position()[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(fine.last_position()[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolate_respects_max_steps() {
        let traj = JointTrajectory::linear(names(), &[0.0, 0.0], &[1.0, 1.0], 10, 1.0).unwrap();
        let fine = traj.interpolate(0.01, 50).unwrap();
        assert_eq!(fine.len(), 50);
        assert_relative_eq!(fine.motion_time(), traj.motion_time(), epsilon = 1e-9);
        assert_relative_eq!(fine.last_position()[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_state_accessor() {
        let traj = JointTrajectory::linear(names(), &[0.0, 0.0], &[1.0, 1.0], 3, 0.5).unwrap();
        let state = traj.state(2).unwrap();
        assert_eq!(state.position, vec![1.0, 1.0]);
        assert_eq!(state.joint_names, names());
        assert!(state.velocity.is_some());
        assert!(traj.state(3).is_none());
    }
}
