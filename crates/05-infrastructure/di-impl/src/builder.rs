//! 对象图构建器
//!
//! 对每个根递归下降：注册表查找 → 类型合一 → 隐式合成，再递归到选中绑定的注入点。
//! 构建过程从不中途终止，未解析的请求记录为哨兵边。

use crate::synthesizer::{ImplicitBindingSynthesizer, ImplicitPlan};
use di_abstractions::{
    AccumulatorSpec, Binding, BindingMatch, BindingRegistry, BindingSource, Dependency,
    DependencyTarget, Graph, Implementation, LookupRequest, Node, NodeFlags, NodeKind, NodeOwner,
    ResolveContext, ResolveOptions, ResolvedRoot, Root, ScopeKey, Substitution, UnresolvedRequest,
};
use di_common::{
    BindingId, CollectionKind, Diagnostic, DiagnosticKind, DiagnosticTarget, Diagnostics,
    InjectionSite, Lifetime, NodeId, TagKey, TagValue, TypeRef, UnresolvedId,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 共享节点的身份键
///
/// 释放归属也是身份的一部分：所有权包装之下的实例不会被包装外的请求复用
type SharedKey = (TypeRef, TagKey, ScopeKey, BindingSource, NodeOwner);

/// 一次依赖请求
#[derive(Debug, Clone)]
struct Request {
    contract: TypeRef,
    tag: Option<TagValue>,
    site: Option<InjectionSite>,
    consumer: Option<NodeId>,
    /// 位置规则匹配所用的注入点全路径
    path: Option<String>,
}

impl Request {
    fn root(root: &Root) -> Self {
        Self {
            contract: root.contract.clone(),
            tag: root.tag.clone(),
            site: None,
            consumer: None,
            path: None,
        }
    }

    fn at(site: &InjectionSite, consumer: NodeId, consumer_type: &TypeRef) -> Self {
        Self {
            contract: site.contract.clone(),
            tag: site.tag.clone(),
            site: Some(site.clone()),
            consumer: Some(consumer),
            path: Some(site.path(consumer_type)),
        }
    }

    /// 隐式节点内部的请求，沿用外层的注入点路径
    fn implicit(&self, name: String, contract: TypeRef, tag: Option<TagValue>, wrapper: NodeId) -> Self {
        let mut site = InjectionSite::implicit(name, contract.clone());
        site.tag = tag.clone();
        Self {
            contract,
            tag,
            site: Some(site),
            consumer: Some(wrapper),
            path: self.path.clone(),
        }
    }

    fn tag_key(&self) -> TagKey {
        self.tag.clone().map_or(TagKey::None, TagKey::Value)
    }

    fn site(&self) -> InjectionSite {
        self.site
            .clone()
            .unwrap_or_else(|| InjectionSite::implicit("root", self.contract.clone()))
    }
}

/// 绑定展开后的构造描述
struct Construction {
    kind: NodeKind,
    result_type: TypeRef,
    sites: Vec<InjectionSite>,
    disposable: bool,
    invalid: bool,
}

/// 对象图构建器
pub struct GraphBuilder<'a> {
    registry: &'a dyn BindingRegistry,
    options: &'a ResolveOptions,
    synthesizer: ImplicitBindingSynthesizer<'a>,
    graph: Graph,
    diagnostics: Diagnostics,
    shared: HashMap<SharedKey, NodeId>,
    synthesized: HashMap<TypeRef, usize>,
    used_tag_on: HashSet<(BindingId, String)>,
    blocks: usize,
    root_name: String,
}

impl<'a> GraphBuilder<'a> {
    /// 创建构建器
    pub fn new(
        registry: &'a dyn BindingRegistry,
        options: &'a ResolveOptions,
        accumulators: &'a [AccumulatorSpec],
    ) -> Self {
        let (synthesizer, diagnostics) = ImplicitBindingSynthesizer::new(registry, options, accumulators);
        Self {
            registry,
            options,
            synthesizer,
            graph: Graph::new(),
            diagnostics,
            shared: HashMap::new(),
            synthesized: HashMap::new(),
            used_tag_on: HashSet::new(),
            blocks: 0,
            root_name: String::new(),
        }
    }

    /// 构建所有根的对象图，返回尽力构建的对象图与构建期诊断
    pub fn build(mut self, roots: &[Root]) -> (Graph, Diagnostics) {
        info!("开始构建对象图: {} 个根", roots.len());
        for (index, root) in roots.iter().enumerate() {
            self.root_name = root.name.clone();
            let block = self.open_block();
            let mut context = ResolveContext::for_root(index, block);
            let target = self.resolve(&Request::root(root), &mut context);
            if let DependencyTarget::Unresolved(_) = target {
                warn!("根 {} ({}) 无法解析", root.name, root.contract);
            }
            self.graph.add_root(ResolvedRoot {
                root: root.clone(),
                target,
            });
        }
        self.finish()
    }

    fn finish(mut self) -> (Graph, Diagnostics) {
        for (id, pattern) in self.registry.unused_tag_on_rules(&self.used_tag_on) {
            warn!("位置规则 {} 未匹配任何注入点", pattern);
            let location = self.registry.binding(id).and_then(|b| b.location.clone());
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnusedTagOnWarning,
                    format!("位置规则 {pattern} 未匹配任何注入点"),
                )
                .at(location)
                .on(DiagnosticTarget::Binding(id)),
            );
        }
        info!(
            "对象图构建完成: {} 个节点, {} 个未解析请求",
            self.graph.nodes().len(),
            self.graph.unresolved().len()
        );
        (self.graph, self.diagnostics)
    }

    fn open_block(&mut self) -> usize {
        self.blocks += 1;
        self.blocks
    }

    fn resolve(&mut self, request: &Request, context: &mut ResolveContext) -> DependencyTarget {
        if context.depth() >= self.options.max_depth {
            warn!("解析深度超过上限 {}: {}", self.options.max_depth, request.contract);
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::InvalidMetadata,
                    format!(
                        "解析深度超过上限 {}: {}",
                        self.options.max_depth, request.contract
                    ),
                )
                .at(request.site.as_ref().and_then(|s| s.location.clone()))
                .on(DiagnosticTarget::Root(self.root_name.clone())),
            );
            return self.unresolved(request);
        }

        let lookup = LookupRequest::new(&request.contract)
            .tagged(request.tag.as_ref())
            .at_site(request.path.as_deref());
        // 匹配到注入点的位置规则都算已使用，无论最终是否胜出
        self.used_tag_on
            .extend(self.registry.matching_tag_on_rules(&lookup));
        match self.registry.lookup(&lookup, self.options) {
            Some(found) => self.resolve_match(request, found, context),
            None => self.synthesize(request, context),
        }
    }

    fn resolve_match(
        &mut self,
        request: &Request,
        found: BindingMatch,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        let registry = self.registry;
        let Some(binding) = registry.binding(found.binding) else {
            return self.unresolved(request);
        };
        let tag = registry.tag_key(found.binding);
        self.resolve_binding(
            &request.contract,
            tag,
            BindingSource::Explicit(found.binding),
            binding,
            &found.substitution,
            context,
        )
    }

    fn resolve_binding(
        &mut self,
        contract: &TypeRef,
        tag: TagKey,
        source: BindingSource,
        binding: &Binding,
        substitution: &Substitution,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        // 路径上已有相同请求：链接回栈上节点而不是继续递归
        if let Some(node) = context.find(contract, &tag) {
            debug!("请求 {} 已在解析路径上, 链接到 {}", contract, node);
            return DependencyTarget::Node(node);
        }

        let lifetime = binding.lifetime;
        let scope = context.scope_for(lifetime);
        let owner = context.owner_for(lifetime);
        let key = scope.map(|scope| (contract.clone(), tag.clone(), scope, source.clone(), owner));
        if let Some(existing) = key.as_ref().and_then(|key| self.shared.get(key)) {
            return DependencyTarget::Node(*existing);
        }

        let construction = self.describe(contract, binding, substitution);
        let id = self.graph.add_node(Node {
            id: NodeId(0),
            contract: contract.clone(),
            tag: tag.clone(),
            result_type: construction.result_type.clone(),
            source,
            kind: construction.kind,
            lifetime,
            scope,
            owner,
            dependencies: Vec::new(),
            disposable: construction.disposable,
            flags: NodeFlags {
                invalid_metadata: construction.invalid,
                ..NodeFlags::default()
            },
        });
        if let Some(key) = key {
            self.shared.insert(key, id);
        }
        debug!("创建节点 {}: {} -> {} ({})", id, contract, construction.result_type, lifetime);

        let saved_owner = context.owner;
        context.owner = owner;
        context.push(contract.clone(), tag, id);
        let mut dependencies = Vec::with_capacity(construction.sites.len());
        for site in &construction.sites {
            let request = Request::at(site, id, &construction.result_type);
            let target = self.resolve(&request, context);
            dependencies.push(Dependency {
                site: site.clone(),
                target,
                deferred: false,
            });
        }
        context.pop();
        context.owner = saved_owner;

        self.attach(id, dependencies);
        DependencyTarget::Node(id)
    }

    /// 展开绑定的实现描述
    fn describe(&mut self, contract: &TypeRef, binding: &Binding, substitution: &Substitution) -> Construction {
        match &binding.implementation {
            Implementation::Type(ty) => {
                let result_type = substitution.apply(ty);
                let registry = self.registry;
                let catalog = registry.catalog();
                let descriptor = catalog
                    .find(&result_type, registry.unifier())
                    .and_then(|(index, found)| catalog.get(index).map(|d| (d, found)));

                match descriptor {
                    Some((descriptor, local)) if descriptor.concrete => {
                        let choice = self.synthesizer.choose_constructor(descriptor, &local);
                        let mut sites: Vec<InjectionSite> = choice
                            .index
                            .and_then(|index| descriptor.constructors.get(index))
                            .map(|constructor| {
                                constructor.params.iter().map(|p| local.apply_site(p)).collect()
                            })
                            .unwrap_or_default();
                        sites.extend(
                            descriptor
                                .injected_members()
                                .into_iter()
                                .map(|site| local.apply_site(site)),
                        );
                        Construction {
                            kind: NodeKind::Construct {
                                constructor: choice.index,
                            },
                            result_type,
                            sites,
                            disposable: descriptor.disposable,
                            // 有构造函数却没有可选的公开构造函数
                            invalid: choice.index.is_none() && !descriptor.constructors.is_empty(),
                        }
                    }
                    _ => Construction {
                        kind: NodeKind::Construct { constructor: None },
                        result_type,
                        sites: Vec::new(),
                        disposable: false,
                        invalid: true,
                    },
                }
            }
            Implementation::Factory { label, sites } => Construction {
                kind: NodeKind::Factory {
                    label: label.clone(),
                },
                result_type: contract.clone(),
                sites: sites.iter().map(|site| substitution.apply_site(site)).collect(),
                disposable: false,
                invalid: false,
            },
            Implementation::Arg { name } => Construction {
                kind: NodeKind::Arg { name: name.clone() },
                result_type: contract.clone(),
                sites: Vec::new(),
                disposable: false,
                invalid: false,
            },
        }
    }

    fn synthesize(&mut self, request: &Request, context: &mut ResolveContext) -> DependencyTarget {
        match self.synthesizer.plan(&request.contract) {
            ImplicitPlan::Accumulator { spec } => self.accumulator_node(request, spec, context),
            ImplicitPlan::AutoBinding { binding } => {
                let index = match self.synthesized.get(&request.contract) {
                    Some(index) => *index,
                    None => {
                        info!("自动绑定具体类型: {}", request.contract);
                        let index = self.graph.add_synthesized(binding.clone());
                        self.synthesized.insert(request.contract.clone(), index);
                        index
                    }
                };
                self.resolve_binding(
                    &request.contract,
                    TagKey::None,
                    BindingSource::Synthesized(index),
                    &binding,
                    &Substitution::new(),
                    context,
                )
            }
            ImplicitPlan::Collection { kind, element } => {
                self.collection_node(request, kind, element, context)
            }
            ImplicitPlan::Func { target } => self.wrapper_node(request, NodeKind::Func, target, context),
            ImplicitPlan::Lazy { target } => self.wrapper_node(request, NodeKind::Lazy, target, context),
            ImplicitPlan::Owned { target } => {
                self.wrapper_node(request, NodeKind::Owned, target, context)
            }
            ImplicitPlan::Tuple { items } => self.tuple_node(request, items, context),
            ImplicitPlan::Unresolved => self.unresolved(request),
        }
    }

    fn implicit_node(
        &mut self,
        request: &Request,
        kind: NodeKind,
        lifetime: Lifetime,
        context: &ResolveContext,
    ) -> NodeId {
        self.graph.add_node(Node {
            id: NodeId(0),
            contract: request.contract.clone(),
            tag: request.tag_key(),
            result_type: request.contract.clone(),
            source: BindingSource::Implicit,
            disposable: matches!(kind, NodeKind::Owned),
            kind,
            lifetime,
            scope: context.scope_for(lifetime),
            owner: context.owner_for(lifetime),
            dependencies: Vec::new(),
            flags: NodeFlags::default(),
        })
    }

    fn accumulator_node(
        &mut self,
        request: &Request,
        spec: usize,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        let lifetime = Lifetime::PerResolve;
        let owner = context.owner_for(lifetime);
        let key = context.scope_for(lifetime).map(|scope| {
            (request.contract.clone(), request.tag_key(), scope, BindingSource::Implicit, owner)
        });
        if let Some(existing) = key.as_ref().and_then(|key| self.shared.get(key)) {
            return DependencyTarget::Node(*existing);
        }
        let id = self.implicit_node(request, NodeKind::Accumulator { spec }, lifetime, context);
        if let Some(key) = key {
            self.shared.insert(key, id);
        }
        debug!("创建累加器节点 {}: {}", id, request.contract);
        DependencyTarget::Node(id)
    }

    fn collection_node(
        &mut self,
        request: &Request,
        kind: CollectionKind,
        element: TypeRef,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        let materialize_once = kind.is_lazy();
        let id = self.implicit_node(
            request,
            NodeKind::Collection {
                kind,
                element: element.clone(),
                materialize_once,
            },
            Lifetime::Transient,
            context,
        );

        let saved_block = context.block;
        if materialize_once {
            // 惰性序列物化是一个独立的构造单元
            context.block = self.open_block();
        }
        let matches = self.registry.all_for_contract(&element);
        debug!("集合 {} 收集到 {} 个绑定", request.contract, matches.len());

        let mut dependencies = Vec::with_capacity(matches.len());
        for (index, found) in matches.into_iter().enumerate() {
            let tag = self.registry.tag_key(found.binding).value().cloned();
            let inner = request.implicit(format!("item{index}"), element.clone(), tag, id);
            let target = self.resolve_match(&inner, found, context);
            dependencies.push(Dependency {
                site: inner.site(),
                target,
                deferred: false,
            });
        }
        context.block = saved_block;

        self.attach(id, dependencies);
        DependencyTarget::Node(id)
    }

    fn wrapper_node(
        &mut self,
        request: &Request,
        kind: NodeKind,
        target: TypeRef,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        let deferred = kind.is_deferred();
        let owned = matches!(kind, NodeKind::Owned);
        let id = self.implicit_node(request, kind, Lifetime::Transient, context);

        let saved_block = context.block;
        let saved_owner = context.owner;
        context.block = self.open_block();
        if owned {
            context.owner = NodeOwner::Owned(id);
        }
        let inner = request.implicit("target".to_string(), target, request.tag.clone(), id);
        let resolved = self.resolve(&inner, context);
        context.block = saved_block;
        context.owner = saved_owner;

        self.attach(
            id,
            vec![Dependency {
                site: inner.site(),
                target: resolved,
                deferred,
            }],
        );
        DependencyTarget::Node(id)
    }

    fn tuple_node(
        &mut self,
        request: &Request,
        items: Vec<TypeRef>,
        context: &mut ResolveContext,
    ) -> DependencyTarget {
        let id = self.implicit_node(request, NodeKind::Tuple, Lifetime::Transient, context);
        let mut dependencies = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let inner = request.implicit(format!("item{index}"), item, None, id);
            let target = self.resolve(&inner, context);
            dependencies.push(Dependency {
                site: inner.site(),
                target,
                deferred: false,
            });
        }
        self.attach(id, dependencies);
        DependencyTarget::Node(id)
    }

    fn attach(&mut self, id: NodeId, dependencies: Vec<Dependency>) {
        let has_unresolved = dependencies
            .iter()
            .any(|d| matches!(d.target, DependencyTarget::Unresolved(_)));
        if let Some(node) = self.graph.node_mut(id) {
            node.dependencies = dependencies;
            node.flags.has_unresolved |= has_unresolved;
        }
    }

    fn unresolved(&mut self, request: &Request) -> DependencyTarget {
        debug!("无法解析请求: {}", request.contract);
        let id = self.graph.add_unresolved(UnresolvedRequest {
            id: UnresolvedId(0),
            contract: request.contract.clone(),
            tag: request.tag.clone(),
            site: request.site.clone(),
            consumer: request.consumer,
            root: self.root_name.clone(),
        });
        DependencyTarget::Unresolved(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BindingRegistryImpl;
    use di_abstractions::TypeCatalog;
    use di_common::{ConstructorDescriptor, Tag, TypeDescriptor};

    fn ty(text: &str) -> TypeRef {
        text.parse().unwrap()
    }

    fn with_params(name: &str, params: &[(&str, &str)]) -> TypeDescriptor {
        TypeDescriptor::concrete(ty(name)).with_constructor(ConstructorDescriptor::new(
            params
                .iter()
                .map(|(param, contract)| InjectionSite::parameter(*param, ty(contract)))
                .collect(),
        ))
    }

    fn build(registry: &BindingRegistryImpl, roots: &[Root]) -> (Graph, Diagnostics) {
        let options = ResolveOptions::default();
        GraphBuilder::new(registry, &options, &[]).build(roots)
    }

    #[test]
    fn per_resolve_nodes_are_shared_within_one_root_only() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Context")))
            .with(with_params("Handler", &[("left", "Context"), ("right", "Context")]));
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(Binding::to(ty("Context"), ty("Context")).with_lifetime(Lifetime::PerResolve));

        let roots = [
            Root::new("first", ty("Handler")),
            Root::new("second", ty("Handler")),
        ];
        let (graph, _) = build(&registry, &roots);
        let first = graph.root_node("first").unwrap();
        let second = graph.root_node("second").unwrap();
        assert_eq!(first.dependencies[0].target, first.dependencies[1].target);
        assert_ne!(first.dependencies[0].target, second.dependencies[0].target);
    }

    #[test]
    fn per_block_nodes_are_shared_within_one_materialization() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Buffer")))
            .with(with_params("Plugin", &[("buffer", "Buffer")]))
            .with(with_params("Host", &[("plugins", "Enumerable<IPlugin>"), ("buffer", "Buffer")]));
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(Binding::to(ty("Buffer"), ty("Buffer")).with_lifetime(Lifetime::PerBlock));
        registry.register(Binding::to(ty("IPlugin"), ty("Plugin")).with_tag(Tag::int(1)));
        registry.register(Binding::to(ty("IPlugin"), ty("Plugin")).with_tag(Tag::int(2)));

        let (graph, diagnostics) = build(&registry, &[Root::new("host", ty("Host"))]);
        assert!(diagnostics.is_empty());
        let host = graph.root_node("host").unwrap();
        let plugins = graph.node(host.dependencies[0].target.node().unwrap()).unwrap();
        assert!(matches!(
            plugins.kind,
            NodeKind::Collection { materialize_once: true, .. }
        ));

        let buffer_of = |plugin: NodeId| graph.node(plugin).unwrap().dependencies[0].target;
        let a = buffer_of(plugins.dependencies[0].target.node().unwrap());
        let b = buffer_of(plugins.dependencies[1].target.node().unwrap());
        assert_eq!(a, b);
        assert_ne!(a, host.dependencies[1].target);
    }

    #[test]
    fn func_edges_are_deferred_and_break_cycles() {
        let catalog = TypeCatalog::new()
            .with(with_params("Parent", &[("child", "Child")]))
            .with(with_params("Child", &[("parent", "Func<Parent>")]));
        let registry = BindingRegistryImpl::new(catalog);

        let (graph, _) = build(&registry, &[Root::new("parent", ty("Parent"))]);
        let parent = graph.root_node("parent").unwrap();
        let child = graph.node(parent.dependencies[0].target.node().unwrap()).unwrap();
        let func = graph.node(child.dependencies[0].target.node().unwrap()).unwrap();
        assert_eq!(func.kind, NodeKind::Func);
        assert!(func.dependencies[0].deferred);
        assert_eq!(func.dependencies[0].target, DependencyTarget::Node(parent.id));
        assert!(graph.topological_order().is_ok());
        assert_eq!(graph.synthesized().len(), 2);
    }

    #[test]
    fn owned_wrapper_owns_transient_disposables() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Connection")).disposable())
            .with(with_params("Session", &[("connection", "Connection")]));
        let registry = BindingRegistryImpl::new(catalog);

        let (graph, _) = build(&registry, &[Root::new("session", ty("Owned<Session>"))]);
        let owned = graph.root_node("session").unwrap();
        assert!(owned.disposable);
        let session = graph.node(owned.dependencies[0].target.node().unwrap()).unwrap();
        let connection = graph.node(session.dependencies[0].target.node().unwrap()).unwrap();
        assert_eq!(session.owner, NodeOwner::Owned(owned.id));
        assert_eq!(connection.owner, NodeOwner::Owned(owned.id));
        assert!(connection.disposable);
    }

    #[test]
    fn per_resolve_under_owned_is_not_shared_outside_the_wrapper() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Conn")).disposable())
            .with(with_params("Worker", &[("conn", "Conn")]))
            .with(with_params("App", &[("worker", "Owned<Worker>"), ("conn", "Conn")]));
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(Binding::to(ty("Conn"), ty("Conn")).with_lifetime(Lifetime::PerResolve));

        let (graph, _) = build(&registry, &[Root::new("app", ty("App"))]);
        let app = graph.root_node("app").unwrap();
        let owned = graph.node(app.dependencies[0].target.node().unwrap()).unwrap();
        let worker = graph.node(owned.dependencies[0].target.node().unwrap()).unwrap();
        let inner_conn = graph.node(worker.dependencies[0].target.node().unwrap()).unwrap();
        let outer_conn = graph.node(app.dependencies[1].target.node().unwrap()).unwrap();

        assert_ne!(inner_conn.id, outer_conn.id);
        assert_eq!(inner_conn.owner, NodeOwner::Owned(owned.id));
        assert_eq!(outer_conn.owner, NodeOwner::Resolve(0));
    }

    #[test]
    fn tag_on_rule_losing_to_exact_tag_counts_as_used() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Fast")))
            .with(TypeDescriptor::concrete(ty("Slow")))
            .with(
                TypeDescriptor::concrete(ty("Consumer")).with_constructor(ConstructorDescriptor::new(vec![
                    InjectionSite::parameter("svc", ty("IService")).with_tag(TagValue::str("x")),
                ])),
            );
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(Binding::to(ty("IService"), ty("Fast")).with_tag(Tag::str("x")));
        registry.register(Binding::to(ty("IService"), ty("Slow")).with_tag(Tag::on(["Consumer.ctor:svc"])));

        let (graph, diagnostics) = build(&registry, &[Root::new("consumer", ty("Consumer"))]);
        let consumer = graph.root_node("consumer").unwrap();
        let svc = graph.node(consumer.dependencies[0].target.node().unwrap()).unwrap();
        assert_eq!(svc.result_type, ty("Fast"));
        assert_eq!(diagnostics.count(DiagnosticKind::UnusedTagOnWarning), 0);
    }

    #[test]
    fn missing_dependencies_become_sentinels() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::abstraction(ty("ILogger")))
            .with(with_params("Service", &[("logger", "ILogger")]));
        let registry = BindingRegistryImpl::new(catalog);

        let (graph, _) = build(&registry, &[Root::new("service", ty("Service"))]);
        let service = graph.root_node("service").unwrap();
        assert!(service.flags.has_unresolved);
        assert_eq!(graph.unresolved().len(), 1);
        assert_eq!(graph.unresolved()[0].requester(&graph), "Service.ctor:logger");
    }

    #[test]
    fn unused_tag_on_rules_are_reported() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::concrete(ty("Clock")))
            .with(with_params("Consumer", &[("clock", "IClock")]));
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(
            Binding::to(ty("IClock"), ty("Clock")).with_tag(Tag::on(["Consumer.ctor:clock", "Other.*"])),
        );

        let (graph, diagnostics) = build(&registry, &[Root::new("consumer", ty("Consumer"))]);
        assert!(graph.is_complete());
        let unused: Vec<_> = diagnostics.of_kind(DiagnosticKind::UnusedTagOnWarning).collect();
        assert_eq!(unused.len(), 1);
        assert!(unused[0].message.contains("Other.*"));
    }

    #[test]
    fn depth_limit_is_reported_instead_of_overflowing() {
        let catalog = TypeCatalog::new().with(with_params("Node<TT>", &[("next", "Node<List<TT>>")]));
        let mut registry = BindingRegistryImpl::new(catalog);
        registry.register(Binding::to(ty("Node<TT>"), ty("Node<TT>")));

        let options = ResolveOptions {
            max_depth: 8,
            ..ResolveOptions::default()
        };
        let (graph, diagnostics) =
            GraphBuilder::new(&registry, &options, &[]).build(&[Root::new("deep", ty("Node<int>"))]);
        assert_eq!(diagnostics.count(DiagnosticKind::InvalidMetadata), 1);
        assert_eq!(graph.unresolved().len(), 1);
    }
}
