//! 循环依赖与完整性检查

use di_abstractions::{CircularDependencyDetector, Graph};
use di_common::{Diagnostic, DiagnosticKind, DiagnosticTarget, Diagnostics, NodeId};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 默认循环依赖检测器
///
/// 对非延迟边做深度优先遍历，回到栈上节点即为一个循环。
/// 循环按节点名称序列的最小旋转规范化，不同根发现的同一循环只报告一次
#[derive(Debug, Default)]
pub struct DefaultCircularDependencyDetector;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    OnStack,
    Done,
}

impl DefaultCircularDependencyDetector {
    /// 创建检测器
    pub fn new() -> Self {
        Self
    }

    /// 收集图中所有不同的循环（节点序列，不含重复的首节点）
    pub fn find_cycles(&self, graph: &Graph) -> Vec<Vec<NodeId>> {
        let mut seen = HashSet::new();
        Self::cycle_instances(graph)
            .into_iter()
            .filter(|cycle| seen.insert(Self::names(graph, cycle)))
            .collect()
    }

    /// 所有循环实例，已规范化旋转但未去重
    fn cycle_instances(graph: &Graph) -> Vec<Vec<NodeId>> {
        let mut marks = vec![Mark::New; graph.nodes().len()];
        let mut stack = Vec::new();
        let mut cycles = Vec::new();

        for node in graph.nodes() {
            if marks[node.id.0] == Mark::New {
                Self::visit(graph, node.id, &mut marks, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    fn visit(
        graph: &Graph,
        id: NodeId,
        marks: &mut [Mark],
        stack: &mut Vec<NodeId>,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        marks[id.0] = Mark::OnStack;
        stack.push(id);

        let targets: Vec<NodeId> = graph
            .node(id)
            .map(|node| {
                node.dependencies
                    .iter()
                    .filter(|d| !d.deferred)
                    .filter_map(|d| d.target.node())
                    .collect()
            })
            .unwrap_or_default();

        for target in targets {
            match marks.get(target.0).copied() {
                Some(Mark::New) => Self::visit(graph, target, marks, stack, cycles),
                Some(Mark::OnStack) => {
                    let start = stack.iter().position(|n| *n == target).unwrap_or(0);
                    cycles.push(Self::canonical(graph, &stack[start..]));
                }
                _ => {}
            }
        }

        stack.pop();
        marks[id.0] = Mark::Done;
    }

    fn names(graph: &Graph, cycle: &[NodeId]) -> Vec<String> {
        cycle
            .iter()
            .map(|n| graph.node(*n).map(|node| node.display_name()).unwrap_or_default())
            .collect()
    }

    /// 旋转到名称序列字典序最小的位置
    fn canonical(graph: &Graph, cycle: &[NodeId]) -> Vec<NodeId> {
        let names = Self::names(graph, cycle);
        let len = cycle.len();
        let start = (0..len)
            .min_by(|a, b| {
                let left = names[*a..].iter().chain(&names[..*a]);
                let right = names[*b..].iter().chain(&names[..*b]);
                left.cmp(right)
            })
            .unwrap_or(0);
        cycle[start..].iter().chain(&cycle[..start]).copied().collect()
    }
}

impl CircularDependencyDetector for DefaultCircularDependencyDetector {
    fn check(&self, graph: &mut Graph) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        // 同一循环经由不同根被重复构造时只报告一次，但每个实例的节点都要标记
        let mut reported = HashSet::new();
        for cycle in Self::cycle_instances(graph) {
            for id in &cycle {
                if let Some(node) = graph.node_mut(*id) {
                    node.flags.cyclic = true;
                }
            }
            let mut names = Self::names(graph, &cycle);
            if !reported.insert(names.clone()) {
                continue;
            }
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            let path = names.join(" -> ");
            warn!("检测到循环依赖: {}", path);
            let mut diagnostic =
                Diagnostic::new(DiagnosticKind::CyclicDependency, format!("检测到循环依赖: {path}"));
            if let Some(first) = cycle.first() {
                diagnostic = diagnostic.on(DiagnosticTarget::Node(*first));
            }
            diagnostics.push(diagnostic);
        }

        for request in graph.unresolved() {
            let tag = request
                .tag
                .as_ref()
                .map(|tag| format!(" (标签 {tag})"))
                .unwrap_or_default();
            let message = format!(
                "无法解析依赖 {}{}, 请求方: {}",
                request.contract,
                tag,
                request.requester(graph)
            );
            debug!("{}", message);
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::Unresolved, message)
                    .at(request.site.as_ref().and_then(|s| s.location.clone()))
                    .on(DiagnosticTarget::Unresolved(request.id)),
            );
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::registry::BindingRegistryImpl;
    use di_abstractions::{ResolveOptions, Root, TypeCatalog};
    use di_common::{ConstructorDescriptor, InjectionSite, TypeDescriptor, TypeRef};

    fn ty(text: &str) -> TypeRef {
        text.parse().unwrap()
    }

    fn depends_on(name: &str, dependency: &str) -> TypeDescriptor {
        TypeDescriptor::concrete(ty(name)).with_constructor(ConstructorDescriptor::new(vec![
            InjectionSite::parameter("next", ty(dependency)),
        ]))
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let registry = BindingRegistryImpl::new(TypeCatalog::new().with(depends_on("Loop", "Loop")));
        let options = ResolveOptions::default();
        let (mut graph, _) = GraphBuilder::new(&registry, &options, &[]).build(&[Root::new("loop", ty("Loop"))]);

        let diagnostics = DefaultCircularDependencyDetector::new().check(&mut graph);
        let cycles: Vec<_> = diagnostics.of_kind(DiagnosticKind::CyclicDependency).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].message, "检测到循环依赖: Loop -> Loop");
        assert!(graph.root_node("loop").unwrap().flags.cyclic);
    }

    #[test]
    fn deferred_edges_are_not_cycles() {
        let registry = BindingRegistryImpl::new(
            TypeCatalog::new()
                .with(depends_on("Parent", "Child"))
                .with(depends_on("Child", "Lazy<Parent>")),
        );
        let options = ResolveOptions::default();
        let (mut graph, _) =
            GraphBuilder::new(&registry, &options, &[]).build(&[Root::new("parent", ty("Parent"))]);
        assert!(DefaultCircularDependencyDetector::new().check(&mut graph).is_empty());
    }

    #[test]
    fn each_unresolved_sentinel_is_reported() {
        let registry = BindingRegistryImpl::new(
            TypeCatalog::new()
                .with(TypeDescriptor::abstraction(ty("IMissing")))
                .with(depends_on("Service", "IMissing")),
        );
        let options = ResolveOptions::default();
        let (mut graph, _) = GraphBuilder::new(&registry, &options, &[]).build(&[
            Root::new("service", ty("Service")),
            Root::new("missing", ty("IMissing")),
        ]);

        let diagnostics = DefaultCircularDependencyDetector::new().check(&mut graph);
        assert_eq!(diagnostics.count(DiagnosticKind::Unresolved), 2);
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages[0].contains("Service.ctor:next"));
        assert!(messages[1].contains("root missing"));
    }
}
