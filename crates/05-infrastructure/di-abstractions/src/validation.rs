//! 对象图校验接口

use crate::graph::Graph;
use crate::resolver::ResolveOptions;
use di_common::Diagnostics;

/// 循环依赖检测器 trait
pub trait CircularDependencyDetector: Send + Sync {
    /// 检测对象图中的循环依赖与未解析哨兵，并标记相关节点
    ///
    /// 每个不同的循环只报告一次
    fn check(&self, graph: &mut Graph) -> Diagnostics;
}

/// 生命周期校验器 trait
pub trait LifetimeValidator: Send + Sync {
    /// 校验每条依赖边的生命周期，冲突只报告不修正
    fn validate(&self, graph: &Graph, options: &ResolveOptions) -> Diagnostics;
}
