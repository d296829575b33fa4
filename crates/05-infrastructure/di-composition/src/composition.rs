//! 构建完成的组合

use di_abstractions::{
    AccumulatorInstance, AccumulatorSpec, DependencyTarget, Graph, NodeKind, ResolveOptions, Root,
};
use di_common::{Diagnostic, Diagnostics, GraphResult, NodeId, SetupError, SetupResult};
use di_impl::{BindingRegistryImpl, ResolutionOutput};
use std::fmt::Write as _;
use tracing::{error, warn};

/// 组合：注册表、对象图与全部诊断
pub struct Composition {
    registry: BindingRegistryImpl,
    roots: Vec<Root>,
    accumulator_specs: Vec<AccumulatorSpec>,
    options: ResolveOptions,
    output: ResolutionOutput,
    diagnostics: Diagnostics,
}

impl Composition {
    pub(crate) fn new(
        registry: BindingRegistryImpl,
        roots: Vec<Root>,
        accumulator_specs: Vec<AccumulatorSpec>,
        options: ResolveOptions,
        output: ResolutionOutput,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            registry,
            roots,
            accumulator_specs,
            options,
            output,
            diagnostics,
        }
    }

    /// 绑定注册表
    pub fn registry(&self) -> &BindingRegistryImpl {
        &self.registry
    }

    /// 声明的根
    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    /// 累加器声明
    pub fn accumulator_specs(&self) -> &[AccumulatorSpec] {
        &self.accumulator_specs
    }

    /// 本次解析使用的选项
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// 构建完成的对象图
    pub fn graph(&self) -> &Graph {
        &self.output.graph
    }

    /// 累加器实例
    pub fn accumulators(&self) -> &[AccumulatorInstance] {
        &self.output.accumulators
    }

    /// 展开、注册与解析阶段的全部诊断
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// 是否没有错误诊断
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    /// 错误诊断
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.errors().collect()
    }

    /// 警告诊断
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics.warnings().collect()
    }

    /// 存在错误诊断时返回验证失败
    pub fn validate(&self) -> SetupResult<()> {
        for warning in self.diagnostics.warnings() {
            warn!("组合警告 [{:?}]: {}", warning.kind, warning.message);
        }
        if self.is_valid() {
            return Ok(());
        }

        let errors: Vec<String> = self
            .diagnostics
            .errors()
            .map(|e| format!("{:?}: {}", e.kind, e.message))
            .collect();
        error!("组合验证失败: {} 个错误", errors.len());
        Err(SetupError::ValidationFailed { errors })
    }

    /// 整个对象图的构造顺序（依赖在前）
    pub fn construction_order(&self) -> GraphResult<Vec<NodeId>> {
        self.output.graph.topological_order()
    }

    /// 以缩进树的形式描述一个根的对象图
    ///
    /// 每行形如 `名称: 节点 [生命周期]`，延迟边追加 `(延迟)`，
    /// 回到当前路径上的节点时追加 `(循环)` 并停止展开
    pub fn describe_root(&self, name: &str) -> Option<String> {
        let graph = &self.output.graph;
        let root = graph.root(name)?;
        let mut out = String::new();
        match root.target {
            DependencyTarget::Node(id) => {
                let mut path = Vec::new();
                self.describe_node(id, name, false, 0, &mut path, &mut out);
            }
            DependencyTarget::Unresolved(_) => {
                let _ = writeln!(out, "{}: <未解析 {}>", name, root.root.contract);
            }
        }
        Some(out)
    }

    fn describe_node(
        &self,
        id: NodeId,
        label: &str,
        deferred: bool,
        depth: usize,
        path: &mut Vec<NodeId>,
        out: &mut String,
    ) {
        let graph = &self.output.graph;
        let Some(node) = graph.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let mut line = format!("{indent}{label}: {} [{}]", node.display_name(), node.lifetime);
        if node.result_type != node.contract && matches!(node.kind, NodeKind::Construct { .. }) {
            let _ = write!(line, " = {}", node.result_type);
        }
        if deferred {
            line.push_str(" (延迟)");
        }
        if path.contains(&id) {
            let _ = writeln!(out, "{line} (循环)");
            return;
        }
        let _ = writeln!(out, "{line}");

        path.push(id);
        for dependency in &node.dependencies {
            match dependency.target {
                DependencyTarget::Node(target) => self.describe_node(
                    target,
                    &dependency.site.name,
                    dependency.deferred,
                    depth + 1,
                    path,
                    out,
                ),
                DependencyTarget::Unresolved(_) => {
                    let _ = writeln!(
                        out,
                        "{}  {}: <未解析 {}>",
                        indent, dependency.site.name, dependency.site.contract
                    );
                }
            }
        }
        path.pop();
    }

    /// 以 JSON 导出对象图，供代码生成器使用
    pub fn graph_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.output.graph)
    }
}
