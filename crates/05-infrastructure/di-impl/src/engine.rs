//! 解析引擎
//!
//! 串联注册表校验、对象图构建、生命周期校验、循环与完整性检查和累加器收集

use crate::accumulator::DefaultAccumulatorCollector;
use crate::builder::GraphBuilder;
use crate::cycle::DefaultCircularDependencyDetector;
use crate::lifetime::DefaultLifetimeValidator;
use di_abstractions::{
    AccumulatorCollector, AccumulatorInstance, AccumulatorSpec, BindingRegistry,
    CircularDependencyDetector, Graph, LifetimeValidator, ResolveOptions, Root,
};
use di_common::Diagnostics;
use tracing::info;

/// 一次解析的输出
#[derive(Debug, Clone)]
pub struct ResolutionOutput {
    /// 尽力构建的对象图
    pub graph: Graph,
    /// 全部诊断
    pub diagnostics: Diagnostics,
    /// 累加器实例
    pub accumulators: Vec<AccumulatorInstance>,
}

impl ResolutionOutput {
    /// 没有错误诊断时对象图可按生命周期规则拓扑遍历
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// 解析引擎
pub struct ResolutionEngine {
    options: ResolveOptions,
    detector: Box<dyn CircularDependencyDetector>,
    validator: Box<dyn LifetimeValidator>,
    collector: Box<dyn AccumulatorCollector>,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

impl ResolutionEngine {
    /// 使用默认组件创建引擎
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            detector: Box::new(DefaultCircularDependencyDetector::new()),
            validator: Box::new(DefaultLifetimeValidator::new()),
            collector: Box::new(DefaultAccumulatorCollector::new()),
        }
    }

    /// 替换循环依赖检测器
    pub fn with_detector(mut self, detector: Box<dyn CircularDependencyDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// 替换生命周期校验器
    pub fn with_validator(mut self, validator: Box<dyn LifetimeValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// 替换累加器收集器
    pub fn with_collector(mut self, collector: Box<dyn AccumulatorCollector>) -> Self {
        self.collector = collector;
        self
    }

    /// 解析选项
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// 解析所有根
    pub fn resolve(
        &self,
        registry: &dyn BindingRegistry,
        roots: &[Root],
        accumulators: &[AccumulatorSpec],
    ) -> ResolutionOutput {
        info!(
            "开始解析: {} 个绑定, {} 个根, {} 个累加器",
            registry.bindings().len(),
            roots.len(),
            accumulators.len()
        );

        let mut diagnostics = registry.validate();
        let (mut graph, built) = GraphBuilder::new(registry, &self.options, accumulators).build(roots);
        diagnostics.extend(built);
        diagnostics.extend(self.validator.validate(&graph, &self.options));
        diagnostics.extend(self.detector.check(&mut graph));
        let accumulators = self.collector.collect(&graph, accumulators, registry);

        info!(
            "解析完成: {} 个节点, {} 个错误, {} 个警告",
            graph.nodes().len(),
            diagnostics.errors().count(),
            diagnostics.warnings().count()
        );
        ResolutionOutput {
            graph,
            diagnostics,
            accumulators,
        }
    }
}
