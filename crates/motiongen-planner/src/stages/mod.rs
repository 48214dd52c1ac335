//! 流水线各阶段
//!
//! 每个阶段是一次批量后端调用加上结果整理，不持有跨请求状态；
//! 尝试计数、截止时间和最优结果都由编排器持有。

pub(crate) mod finetune;
pub(crate) mod graph;
pub(crate) mod ik;
pub(crate) mod trajopt;

use crate::config::MotionGenConfig;
use motiongen_backend::{CollisionWorld, Kinematics};

/// 阶段共享的只读上下文
pub(crate) struct StageContext<'a> {
    pub config: &'a MotionGenConfig,
    pub kinematics: &'a dyn Kinematics,
    pub world: &'a dyn CollisionWorld,
}

/// 把候选循环重复到批大小 `n`；关闭填充时只截断
pub(crate) fn pad_cyclic<T: Clone>(items: &[T], n: usize, use_padding: bool) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    if use_padding {
        items.iter().cycle().take(n).cloned().collect()
    } else {
        items.iter().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::pad_cyclic;

    #[test]
    fn test_pad_cyclic() {
        assert_eq!(pad_cyclic(&[1, 2], 5, true), vec![1, 2, 1, 2, 1]);
        assert_eq!(pad_cyclic(&[1, 2, 3], 2, true), vec![1, 2]);
        assert_eq!(pad_cyclic(&[1, 2], 5, false), vec![1, 2]);
        assert!(pad_cyclic::<i32>(&[], 4, true).is_empty());
    }
}
