//! 对象构造图
//!
//! 节点和边保存在以索引寻址的存储中，循环依赖以普通的边表示，不需要循环所有权。
//! 无效节点（循环、未解析）被保留并标记，供诊断和工具渲染。

use crate::registry::{Binding, Root};
use chrono::{DateTime, Utc};
use di_common::{
    BindingId, CollectionKind, GraphError, GraphResult, InjectionSite, Lifetime, NodeId, TagKey,
    TagValue, TypeRef, UnresolvedId,
};
use serde::Serialize;
use uuid::Uuid;

/// 节点的绑定来源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum BindingSource {
    /// 显式声明的绑定
    Explicit(BindingId),
    /// 自动绑定合成的绑定，索引指向 [`Graph::synthesized`]
    Synthesized(usize),
    /// 集合、工厂、惰性值、所有权包装、元组、累加器等隐式构造
    Implicit,
}

/// 节点构造方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// 调用构造函数，索引指向类型描述符的构造函数列表；None 表示隐式无参构造或缺少元数据
    Construct { constructor: Option<usize> },
    /// 显式工厂
    Factory { label: String },
    /// 组合参数
    Arg { name: String },
    /// 集合，`materialize_once` 表示惰性序列首次迭代时物化一次并缓存
    Collection {
        kind: CollectionKind,
        element: TypeRef,
        materialize_once: bool,
    },
    /// 工厂函数，每次调用时解析目标
    Func,
    /// 惰性值，首次访问时解析并缓存
    Lazy,
    /// 所有权包装，持有独立的释放跟踪器
    Owned,
    /// 元组
    Tuple,
    /// 累加器实例，索引指向累加器声明
    Accumulator { spec: usize },
}

impl NodeKind {
    /// 是否为延迟执行边界
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Func | Self::Lazy)
    }
}

/// 共享范围键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeKey {
    /// 组合范围（单例、作用域）
    Composition,
    /// 一次根解析（PerResolve）
    Resolve(usize),
    /// 一个构造单元（PerBlock）
    Block(usize),
}

/// 节点实例的释放归属
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeOwner {
    /// 由组合销毁时释放
    Composition,
    /// 由一次根解析的作用域释放
    Resolve(usize),
    /// 由所有权包装节点释放
    Owned(NodeId),
}

/// 依赖目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DependencyTarget {
    Node(NodeId),
    /// 未解析哨兵
    Unresolved(UnresolvedId),
}

impl DependencyTarget {
    /// 目标节点，未解析时为 None
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Unresolved(_) => None,
        }
    }
}

/// 已解析的注入点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// 注入点
    pub site: InjectionSite,
    /// 依赖目标
    pub target: DependencyTarget,
    /// 延迟边：目标在调用时才构造
    pub deferred: bool,
}

/// 节点标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeFlags {
    /// 位于循环依赖中
    pub cyclic: bool,
    /// 含有未解析的依赖
    pub has_unresolved: bool,
    /// 元数据无效
    pub invalid_metadata: bool,
}

/// 对象图节点：一个已解析的构造步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// 节点 ID
    pub id: NodeId,
    /// 请求的契约类型
    pub contract: TypeRef,
    /// 命中绑定的标签键
    pub tag: TagKey,
    /// 实际构造的类型
    pub result_type: TypeRef,
    /// 节点来源
    pub source: BindingSource,
    /// 节点种类
    pub kind: NodeKind,
    /// 生命周期
    pub lifetime: Lifetime,
    /// 共享范围，瞬时节点为 None
    pub scope: Option<ScopeKey>,
    /// 释放归属
    pub owner: NodeOwner,
    /// 按顺序解析的注入点
    pub dependencies: Vec<Dependency>,
    /// 实例是否需要释放
    pub disposable: bool,
    /// 标记
    pub flags: NodeFlags,
}

impl Node {
    /// 节点是否有效
    pub fn is_valid(&self) -> bool {
        !(self.flags.cyclic || self.flags.has_unresolved || self.flags.invalid_metadata)
    }

    /// 节点的显示名称
    pub fn display_name(&self) -> String {
        match &self.tag {
            TagKey::None => self.contract.to_string(),
            tag => format!("{}({})", self.contract, tag),
        }
    }
}

/// 未解析的请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRequest {
    /// 请求 ID
    pub id: UnresolvedId,
    /// 请求的契约
    pub contract: TypeRef,
    /// 请求的标签
    pub tag: Option<TagValue>,
    /// 请求的注入点，根直接请求时为 None
    pub site: Option<InjectionSite>,
    /// 请求方节点
    pub consumer: Option<NodeId>,
    /// 发起解析的根名称
    pub root: String,
}

impl UnresolvedRequest {
    /// 请求位置的描述
    pub fn requester(&self, graph: &Graph) -> String {
        match (&self.site, self.consumer.and_then(|id| graph.node(id))) {
            (Some(site), Some(consumer)) => site.path(&consumer.result_type),
            (Some(site), None) => format!("{}:{}", site.member, site.name),
            _ => format!("root {}", self.root),
        }
    }
}

/// 已解析的根
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRoot {
    /// 根声明
    pub root: Root,
    /// 根节点或未解析哨兵
    pub target: DependencyTarget,
}

/// 一次组合的对象图
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    /// 构建 ID
    pub build_id: Uuid,
    /// 构建时间
    pub built_at: DateTime<Utc>,
    nodes: Vec<Node>,
    roots: Vec<ResolvedRoot>,
    unresolved: Vec<UnresolvedRequest>,
    synthesized: Vec<Binding>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// 创建空对象图
    pub fn new() -> Self {
        Self {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            nodes: Vec::new(),
            roots: Vec::new(),
            unresolved: Vec::new(),
            synthesized: Vec::new(),
        }
    }

    /// 添加节点，节点标识由对象图分配
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.id = id;
        self.nodes.push(node);
        id
    }

    /// 获取节点
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// 获取可变节点
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// 所有节点（按创建顺序）
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// 添加根
    pub fn add_root(&mut self, root: ResolvedRoot) {
        self.roots.push(root);
    }

    /// 所有根
    pub fn roots(&self) -> &[ResolvedRoot] {
        &self.roots
    }

    /// 按名称获取根
    pub fn root(&self, name: &str) -> Option<&ResolvedRoot> {
        self.roots.iter().find(|r| r.root.name == name)
    }

    /// 按名称获取根节点
    pub fn root_node(&self, name: &str) -> Option<&Node> {
        self.root(name)
            .and_then(|r| r.target.node())
            .and_then(|id| self.node(id))
    }

    /// 记录未解析哨兵
    pub fn add_unresolved(&mut self, mut request: UnresolvedRequest) -> UnresolvedId {
        let id = UnresolvedId(self.unresolved.len());
        request.id = id;
        self.unresolved.push(request);
        id
    }

    /// 所有未解析请求
    pub fn unresolved(&self) -> &[UnresolvedRequest] {
        &self.unresolved
    }

    /// 记录自动绑定合成的绑定
    pub fn add_synthesized(&mut self, binding: Binding) -> usize {
        self.synthesized.push(binding);
        self.synthesized.len() - 1
    }

    /// 自动绑定合成的绑定
    pub fn synthesized(&self) -> &[Binding] {
        &self.synthesized
    }

    /// 指定契约的所有节点
    pub fn nodes_for<'a>(&'a self, contract: &'a TypeRef) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| &n.contract == contract)
    }

    /// 节点的直接依赖节点
    pub fn dependency_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| {
                node.dependencies
                    .iter()
                    .filter_map(|d| d.target.node())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 每条边都指向图中存在的节点且没有未解析哨兵
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
            && self.nodes.iter().all(|node| {
                node.dependencies.iter().all(|d| match d.target {
                    DependencyTarget::Node(id) => self.node(id).is_some(),
                    DependencyTarget::Unresolved(_) => false,
                })
            })
    }

    /// 拓扑序（依赖在前），忽略延迟边
    pub fn topological_order(&self) -> GraphResult<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            graph: &Graph,
            id: NodeId,
            marks: &mut [Mark],
            stack: &mut Vec<NodeId>,
            order: &mut Vec<NodeId>,
        ) -> GraphResult<()> {
            match marks.get(id.0) {
                None => return Err(GraphError::NodeNotFound { id: id.0 }),
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Active) => {
                    let start = stack.iter().position(|n| *n == id).unwrap_or(0);
                    let mut names: Vec<String> = stack[start..]
                        .iter()
                        .filter_map(|n| graph.node(*n))
                        .map(Node::display_name)
                        .collect();
                    if let Some(node) = graph.node(id) {
                        names.push(node.display_name());
                    }
                    return Err(GraphError::CycleDetected {
                        cycle: names.join(" -> "),
                    });
                }
                Some(Mark::New) => {}
            }

            marks[id.0] = Mark::Active;
            stack.push(id);
            if let Some(node) = graph.node(id) {
                for dependency in node.dependencies.iter().filter(|d| !d.deferred) {
                    if let Some(target) = dependency.target.node() {
                        visit(graph, target, marks, stack, order)?;
                    }
                }
            }
            stack.pop();
            marks[id.0] = Mark::Done;
            order.push(id);
            Ok(())
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            visit(self, node.id, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }
}
