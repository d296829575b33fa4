//! 生命周期校验

use di_abstractions::{Graph, LifetimeValidator, Node, NodeKind, ResolveOptions};
use di_common::{Diagnostic, DiagnosticKind, DiagnosticTarget, Diagnostics, NodeId, Severity};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 生命周期校验器实现
///
/// 从每个共享节点出发，穿过瞬时节点和惰性值检查依赖，遇到工厂函数或另一个共享节点时停止
#[derive(Debug, Default)]
pub struct DefaultLifetimeValidator;

impl DefaultLifetimeValidator {
    /// 创建验证器
    pub fn new() -> Self {
        Self
    }

    fn reachable_shared(graph: &Graph, consumer: &Node) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = consumer
            .dependencies
            .iter()
            .filter_map(|d| d.target.node())
            .collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = graph.node(id) else {
                continue;
            };
            if node.lifetime.is_shared() {
                found.push(id);
                continue;
            }
            // 工厂函数每次调用时才解析目标
            if node.kind == NodeKind::Func {
                continue;
            }
            stack.extend(node.dependencies.iter().filter_map(|d| d.target.node()));
        }
        found.sort_unstable();
        found
    }
}

impl LifetimeValidator for DefaultLifetimeValidator {
    fn validate(&self, graph: &Graph, options: &ResolveOptions) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let mut reported = HashSet::new();
        let severity = if options.strict_lifetimes {
            Severity::Error
        } else {
            Severity::Warning
        };

        for consumer in graph.nodes().iter().filter(|n| n.lifetime.is_shared()) {
            for id in Self::reachable_shared(graph, consumer) {
                let Some(dependency) = graph.node(id) else {
                    continue;
                };
                if !consumer.lifetime.captures(dependency.lifetime) || !reported.insert((consumer.id, id)) {
                    continue;
                }
                warn!(
                    "生命周期冲突: {} 节点 {} 依赖 {} 节点 {}",
                    consumer.lifetime,
                    consumer.display_name(),
                    dependency.lifetime,
                    dependency.display_name()
                );
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::LifetimeConflict,
                        format!(
                            "生命周期冲突: {} 节点 {} 依赖更窄范围的 {} 节点 {}",
                            consumer.lifetime,
                            consumer.display_name(),
                            dependency.lifetime,
                            dependency.display_name()
                        ),
                    )
                    .with_severity(severity)
                    .on(DiagnosticTarget::Node(consumer.id)),
                );
            }
        }
        debug!("生命周期校验完成, 发现 {} 处冲突", diagnostics.len());
        diagnostics
    }
}
