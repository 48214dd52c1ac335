//! 障碍物世界模型
//!
//! 世界由长方体（OBB）和三角网格组成。碰撞后端按障碍物数量预分配缓存，
//! [`CacheCapacity`] 描述这一容量需求。

use crate::pose::Pose;
use nalgebra::Vector3;

/// 长方体障碍物
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cuboid {
    /// 名称
    pub name: String,
    /// 边长 `[x, y, z]`（米，完整尺寸而非半长）
    pub dims: [f64; 3],
    /// 中心位姿
    pub pose: Pose,
}

impl Cuboid {
    pub fn new(name: impl Into<String>, dims: [f64; 3], pose: Pose) -> Self {
        Self {
            name: name.into(),
            dims,
            pose,
        }
    }

    /// 半长
    pub fn half_extents(&self) -> Vector3<f64> {
        Vector3::new(self.dims[0], self.dims[1], self.dims[2]) * 0.5
    }

    /// 点到长方体表面的有符号距离（内部为负）
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        let local = self.pose.inverse_transform_point(point);
        let q = local.abs() - self.half_extents();
        let outside = q.map(|v| v.max(0.0)).norm();
        let inside = q.x.max(q.y).max(q.z).min(0.0);
        outside + inside
    }
}

/// 三角网格障碍物
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// 名称
    pub name: String,
    /// 顶点（网格局部坐标系）
    pub vertices: Vec<[f64; 3]>,
    /// 三角面片顶点索引
    pub faces: Vec<[u32; 3]>,
    /// 网格位姿
    pub pose: Pose,
}

impl Mesh {
    /// 局部坐标系下的包围盒，转换为同位姿的长方体
    ///
    /// 只支持基本体的后端用它保守近似网格。空网格返回 `None`。
    pub fn bounding_cuboid(&self) -> Option<Cuboid> {
        let first = self.vertices.first()?;
        let mut lo = Vector3::from(*first);
        let mut hi = lo;
        for v in &self.vertices[1..] {
            let p = Vector3::from(*v);
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }
        let center = (lo + hi) * 0.5;
        let dims = hi - lo;
        Some(Cuboid::new(
            self.name.clone(),
            [dims.x, dims.y, dims.z],
            self.pose.multiply(&Pose::from_translation(center.x, center.y, center.z)),
        ))
    }
}

/// 碰撞缓存容量（按障碍物类型计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheCapacity {
    /// 长方体数量
    pub obb: usize,
    /// 网格数量
    pub mesh: usize,
}

impl CacheCapacity {
    pub fn new(obb: usize, mesh: usize) -> Self {
        Self { obb, mesh }
    }

    /// 逐项取最大值
    pub fn max(self, other: CacheCapacity) -> Self {
        Self {
            obb: self.obb.max(other.obb),
            mesh: self.mesh.max(other.mesh),
        }
    }

    /// `self` 是否能放进 `capacity`
    pub fn fits_in(&self, capacity: &CacheCapacity) -> bool {
        self.obb <= capacity.obb && self.mesh <= capacity.mesh
    }
}

/// 世界模型
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldModel {
    /// 长方体障碍物
    pub cuboids: Vec<Cuboid>,
    /// 网格障碍物
    pub meshes: Vec<Mesh>,
}

impl WorldModel {
    /// 空世界
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_cuboid(mut self, cuboid: Cuboid) -> Self {
        self.cuboids.push(cuboid);
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// 障碍物总数
    pub fn len(&self) -> usize {
        self.cuboids.len() + self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 加载该世界所需的缓存容量
    pub fn cache_requirement(&self) -> CacheCapacity {
        CacheCapacity::new(self.cuboids.len(), self.meshes.len())
    }

    /// 将网格替换为包围盒，得到只含长方体的世界
    pub fn to_obb_world(&self) -> WorldModel {
        let mut cuboids = self.cuboids.clone();
        cuboids.extend(self.meshes.iter().filter_map(Mesh::bounding_cuboid));
        WorldModel {
            cuboids,
            meshes: Vec::new(),
        }
    }
}
