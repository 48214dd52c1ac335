//! # 分组统计
//!
//! 一组规划请求的成功率和各指标的分布统计（可选模块）
//!
//! 需要启用 `statistics` feature：
//! ```toml
//! motiongen-tools = { workspace = true, features = ["statistics"] }
//! ```

use crate::metrics::PlanMetrics;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, OrderStatistics, Statistics};

/// 一组样本的分布统计
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistic {
    pub mean: f64,
    /// 总体标准差
    pub std: f64,
    pub median: f64,
    pub percent_75: f64,
    pub percent_98: f64,
}

impl Statistic {
    /// 计算统计量；空样本返回全 0
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut data = Data::new(values.to_vec());
        Self {
            mean: values.iter().mean(),
            std: values.iter().population_std_dev(),
            median: data.median(),
            percent_75: data.percentile(75),
            percent_98: data.percentile(98),
        }
    }
}

/// 一组规划请求的汇总
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupMetrics {
    /// 参与统计的有效请求数
    pub group_size: usize,
    /// 成功率（%）
    pub success: f64,
    // 以下统计只针对成功的请求
    pub time: Statistic,
    pub solve_time: Statistic,
    pub motion_time: Statistic,
    pub position_error: Statistic,
    pub orientation_error: Statistic,
    pub attempts: Statistic,
}

impl GroupMetrics {
    pub fn from_list(metrics: &[PlanMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let successes: Vec<&PlanMetrics> = metrics.iter().filter(|m| m.success).collect();
        let stat = |f: fn(&PlanMetrics) -> f64| {
            let values: Vec<f64> = successes.iter().map(|m| f(m)).collect();
            Statistic::from_values(&values)
        };

        Self {
            group_size: metrics.len(),
            success: 100.0 * successes.len() as f64 / metrics.len() as f64,
            time: stat(|m| m.time),
            solve_time: stat(|m| m.solve_time),
            motion_time: stat(|m| m.motion_time),
            position_error: stat(|m| m.position_error),
            orientation_error: stat(|m| m.orientation_error),
            attempts: stat(|m| m.attempts as f64),
        }
    }
}
