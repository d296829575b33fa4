//! 累加器收集接口

use crate::graph::Graph;
use crate::registry::{AccumulatorSpec, BindingRegistry};
use di_common::{NodeId, TypeRef};
use serde::Serialize;

/// 累加器实例的范围
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AccumulatorScope {
    /// 组合级实例，收集单例与作用域节点
    Composition,
    /// 某个根的一次解析
    Resolve { root: String },
}

/// 一个累加器实例及其收集的成员
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccumulatorInstance {
    /// 累加器声明序号
    pub spec: usize,
    /// 累加器类型
    pub accumulator: TypeRef,
    /// 实例所属范围
    pub scope: AccumulatorScope,
    /// 按构造顺序（依赖在前）排列的成员节点
    pub members: Vec<NodeId>,
}

/// 累加器收集器 trait
pub trait AccumulatorCollector: Send + Sync {
    /// 按构造顺序收集每个累加器声明的成员
    fn collect(
        &self,
        graph: &Graph,
        specs: &[AccumulatorSpec],
        registry: &dyn BindingRegistry,
    ) -> Vec<AccumulatorInstance>;
}
