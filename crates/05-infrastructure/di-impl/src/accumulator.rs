//! 累加器收集

use di_abstractions::{
    AccumulatorCollector, AccumulatorInstance, AccumulatorScope, AccumulatorSpec, BindingRegistry,
    Graph, Node, NodeKind,
};
use di_common::NodeId;
use std::collections::HashSet;
use tracing::debug;

/// 默认累加器收集器
///
/// 按根做后序遍历（包含延迟边），得到依赖在前、使用方在后的构造顺序
#[derive(Debug, Default)]
pub struct DefaultAccumulatorCollector;

impl DefaultAccumulatorCollector {
    /// 创建收集器
    pub fn new() -> Self {
        Self
    }

    fn construction_order(graph: &Graph, root: NodeId) -> Vec<NodeId> {
        fn visit(graph: &Graph, id: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
            if !visited.insert(id) {
                return;
            }
            if let Some(node) = graph.node(id) {
                for target in node.dependencies.iter().filter_map(|d| d.target.node()) {
                    visit(graph, target, visited, order);
                }
            }
            order.push(id);
        }

        let mut visited = HashSet::new();
        let mut order = Vec::new();
        visit(graph, root, &mut visited, &mut order);
        order
    }

    fn matches(node: &Node, spec: &AccumulatorSpec, registry: &dyn BindingRegistry) -> bool {
        if matches!(node.kind, NodeKind::Accumulator { .. }) || !spec.applies_to(node.lifetime) {
            return false;
        }
        let unifier = registry.unifier();
        unifier.matches(&node.result_type, &spec.contract)
            || unifier.matches(&node.contract, &spec.contract)
            || registry
                .catalog()
                .implements(&node.result_type, &spec.contract, unifier)
    }
}

impl AccumulatorCollector for DefaultAccumulatorCollector {
    fn collect(
        &self,
        graph: &Graph,
        specs: &[AccumulatorSpec],
        registry: &dyn BindingRegistry,
    ) -> Vec<AccumulatorInstance> {
        let mut instances = Vec::new();

        for (index, spec) in specs.iter().enumerate() {
            let mut composition = Vec::new();
            let mut per_root = Vec::new();
            let mut composition_seen = HashSet::new();

            for root in graph.roots() {
                let Some(root_id) = root.target.node() else {
                    continue;
                };
                let mut members = Vec::new();
                let mut requested = false;
                for id in Self::construction_order(graph, root_id) {
                    let Some(node) = graph.node(id) else {
                        continue;
                    };
                    if node.kind == (NodeKind::Accumulator { spec: index }) {
                        requested = true;
                        continue;
                    }
                    if !Self::matches(node, spec, registry) {
                        continue;
                    }
                    if node.lifetime.is_composition_owned() {
                        if composition_seen.insert(id) {
                            composition.push(id);
                        }
                    } else {
                        members.push(id);
                    }
                }
                if requested || !members.is_empty() {
                    per_root.push(AccumulatorInstance {
                        spec: index,
                        accumulator: spec.accumulator.clone(),
                        scope: AccumulatorScope::Resolve {
                            root: root.root.name.clone(),
                        },
                        members,
                    });
                }
            }

            if !composition.is_empty() {
                instances.push(AccumulatorInstance {
                    spec: index,
                    accumulator: spec.accumulator.clone(),
                    scope: AccumulatorScope::Composition,
                    members: composition,
                });
            }
            instances.extend(per_root);
            debug!("累加器 {} 收集完成", spec.accumulator);
        }
        instances
    }
}
