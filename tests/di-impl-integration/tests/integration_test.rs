//! 解析引擎端到端集成测试

use anyhow::Result;
use di_abstractions::{
    AccumulatorScope, AccumulatorSpec, Binding, BindingRegistry, DependencyTarget, Graph, NodeKind,
    ResolveOptions, Root, TypeCatalog,
};
use di_common::{
    ConstructorDescriptor, DiagnosticKind, InjectionSite, Lifetime, NodeId, Tag, TagValue,
    TypeDescriptor, TypeRef,
};
use di_composition::{CompositionBuilder, CompositionSetup};
use di_impl::{BindingRegistryImpl, ResolutionEngine, ResolutionOutput};

fn ty(text: &str) -> TypeRef {
    text.parse().unwrap()
}

/// 带单个构造函数的具体类型
fn component(name: &str, params: &[(&str, &str)]) -> TypeDescriptor {
    let params = params
        .iter()
        .map(|(param, contract)| InjectionSite::parameter(*param, ty(contract)))
        .collect();
    TypeDescriptor::concrete(ty(name)).with_constructor(ConstructorDescriptor::new(params))
}

fn resolve(
    catalog: TypeCatalog,
    bindings: Vec<Binding>,
    roots: &[Root],
    accumulators: &[AccumulatorSpec],
) -> ResolutionOutput {
    let mut registry = BindingRegistryImpl::new(catalog);
    registry.register_all(bindings);
    ResolutionEngine::default().resolve(&registry, roots, accumulators)
}

fn root_id(graph: &Graph, name: &str) -> NodeId {
    graph.root(name).and_then(|r| r.target.node()).expect("根应该已解析")
}

fn dependency(graph: &Graph, id: NodeId, site: &str) -> NodeId {
    graph
        .node(id)
        .and_then(|node| node.dependencies.iter().find(|d| d.site.name == site))
        .and_then(|d| d.target.node())
        .expect("依赖应该已解析")
}

fn result_types(graph: &Graph, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .map(|id| graph.node(*id).unwrap().result_type.to_string())
        .collect()
}

#[test]
fn test_complete_graph_has_every_edge_resolved() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Config")).implementing(ty("IConfig")))
        .with(TypeDescriptor::concrete(ty("Clock")).implementing(ty("IClock")))
        .with(component("Logger", &[("clock", "IClock")]).implementing(ty("ILogger")))
        .with(component("Service", &[("config", "IConfig"), ("logger", "ILogger")]));
    let bindings = vec![
        Binding::to(ty("IConfig"), ty("Config")).with_lifetime(Lifetime::Singleton),
        Binding::to(ty("IClock"), ty("Clock")),
        Binding::to(ty("ILogger"), ty("Logger")).with_lifetime(Lifetime::PerResolve),
    ];

    let output = resolve(catalog, bindings, &[Root::new("service", ty("Service"))], &[]);

    assert_eq!(output.diagnostics.count(DiagnosticKind::Unresolved), 0);
    assert_eq!(output.diagnostics.count(DiagnosticKind::CyclicDependency), 0);
    assert!(output.is_valid());
    assert!(output.graph.is_complete());
    for node in output.graph.nodes() {
        for dependency in &node.dependencies {
            let target = dependency.target.node().expect("不应存在未解析哨兵");
            assert!(output.graph.node(target).is_some());
        }
    }
    assert_eq!(output.graph.topological_order().unwrap().len(), 4);
}

#[test]
fn test_singleton_is_shared_across_paths_and_roots() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Config")).implementing(ty("IConfig")))
        .with(component("Repository", &[("config", "IConfig")]))
        .with(component("Service", &[("config", "IConfig"), ("repository", "Repository")]));
    let bindings = vec![Binding::to(ty("IConfig"), ty("Config")).with_lifetime(Lifetime::Singleton)];
    let roots = [
        Root::new("repository", ty("Repository")),
        Root::new("service", ty("Service")),
    ];

    let output = resolve(catalog, bindings, &roots, &[]);
    let graph = &output.graph;

    assert_eq!(graph.nodes_for(&ty("IConfig")).count(), 1);
    let service = root_id(graph, "service");
    let repository = dependency(graph, service, "repository");
    assert_eq!(
        dependency(graph, service, "config"),
        dependency(graph, repository, "config")
    );
    assert_eq!(
        dependency(graph, root_id(graph, "repository"), "config"),
        dependency(graph, service, "config")
    );
}

#[test]
fn test_transient_requests_get_distinct_nodes() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Worker")).implementing(ty("IWorker")))
        .with(component("Pool", &[("first", "IWorker"), ("second", "IWorker")]));
    let bindings = vec![Binding::to(ty("IWorker"), ty("Worker"))];

    let output = resolve(catalog, bindings, &[Root::new("pool", ty("Pool"))], &[]);
    let graph = &output.graph;
    let pool = root_id(graph, "pool");

    assert_ne!(dependency(graph, pool, "first"), dependency(graph, pool, "second"));
    assert_eq!(graph.nodes_for(&ty("IWorker")).count(), 2);
}

#[test]
fn test_empty_collection_is_resolved() {
    let catalog = TypeCatalog::new().with(TypeDescriptor::abstraction(ty("IPlugin")));

    let output = resolve(catalog, Vec::new(), &[Root::new("plugins", ty("List<IPlugin>"))], &[]);
    let graph = &output.graph;
    let plugins = graph.node(root_id(graph, "plugins")).unwrap();

    assert!(matches!(plugins.kind, NodeKind::Collection { .. }));
    assert!(plugins.dependencies.is_empty());
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_tagged_bindings_collect_in_declaration_order() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("First")).implementing(ty("IPlugin")))
        .with(TypeDescriptor::concrete(ty("Second")).implementing(ty("IPlugin")))
        .with(TypeDescriptor::concrete(ty("Third")).implementing(ty("IPlugin")));
    let bindings = vec![
        Binding::to(ty("IPlugin"), ty("First")).with_tag(Tag::int(1)),
        Binding::to(ty("IPlugin"), ty("Second")).with_tag(Tag::int(2)),
        Binding::to(ty("IPlugin"), ty("Third")).with_tag(Tag::int(3)),
    ];

    let output = resolve(catalog, bindings, &[Root::new("plugins", ty("IPlugin[]"))], &[]);
    let graph = &output.graph;
    let elements = graph.dependency_nodes(root_id(graph, "plugins"));

    assert_eq!(result_types(graph, &elements), vec!["First", "Second", "Third"]);
    let tags: Vec<_> = elements
        .iter()
        .map(|id| graph.node(*id).unwrap().tag.value().cloned())
        .collect();
    assert_eq!(
        tags,
        vec![Some(TagValue::Int(1)), Some(TagValue::Int(2)), Some(TagValue::Int(3))]
    );
}

#[test]
fn test_cycle_is_reported_once_across_roots() {
    let catalog = TypeCatalog::new()
        .with(component("A", &[("b", "B")]))
        .with(component("B", &[("c", "C")]))
        .with(component("C", &[("a", "A")]));
    let roots = [Root::new("a", ty("A")), Root::new("b", ty("B"))];

    let output = resolve(catalog, Vec::new(), &roots, &[]);

    let cycles: Vec<_> = output
        .diagnostics
        .of_kind(DiagnosticKind::CyclicDependency)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].message, "检测到循环依赖: A -> B -> C -> A");
    assert!(output.graph.nodes().iter().all(|n| n.flags.cyclic));
    assert!(output.graph.topological_order().is_err());
    assert!(!output.is_valid());
}

#[test]
fn test_exact_tag_beats_tag_on_and_fallback() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Slow")).implementing(ty("IService")))
        .with(TypeDescriptor::concrete(ty("Medium")).implementing(ty("IService")))
        .with(TypeDescriptor::concrete(ty("Fast")).implementing(ty("IService")))
        .with(
            TypeDescriptor::concrete(ty("Tagged")).with_constructor(ConstructorDescriptor::new(vec![
                InjectionSite::parameter("service", ty("IService")).with_tag(TagValue::str("fast")),
            ])),
        )
        .with(component("Located", &[("service", "IService")]))
        .with(component("Plain", &[("service", "IService")]));
    let bindings = vec![
        Binding::to(ty("IService"), ty("Slow")),
        Binding::to(ty("IService"), ty("Medium"))
            .with_tag(Tag::on(["Tagged.ctor:service", "Located.ctor:service"])),
        Binding::to(ty("IService"), ty("Fast")).with_tag(Tag::str("fast")),
    ];
    let roots = [
        Root::new("tagged", ty("Tagged")),
        Root::new("located", ty("Located")),
        Root::new("plain", ty("Plain")),
    ];

    let output = resolve(catalog, bindings, &roots, &[]);
    let graph = &output.graph;
    let chosen = |root: &str| {
        let id = dependency(graph, root_id(graph, root), "service");
        graph.node(id).unwrap().result_type.to_string()
    };

    assert_eq!(chosen("tagged"), "Fast");
    assert_eq!(chosen("located"), "Medium");
    assert_eq!(chosen("plain"), "Slow");
    // 位置规则在 Tagged 上输给精确标签，但它匹配过注入点，不产生未使用警告
    assert_eq!(output.diagnostics.count(DiagnosticKind::UnusedTagOnWarning), 0);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_unique_bindings_are_never_merged() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Audit")).implementing(ty("IPlugin")))
        .with(TypeDescriptor::concrete(ty("Cache")).implementing(ty("IPlugin")));
    let bindings = vec![
        Binding::to(ty("IPlugin"), ty("Audit")).with_tag(Tag::Unique),
        Binding::to(ty("IPlugin"), ty("Cache")).with_tag(Tag::Unique),
    ];

    let output = resolve(catalog, bindings, &[Root::new("plugins", ty("List<IPlugin>"))], &[]);
    let graph = &output.graph;
    let elements = graph.dependency_nodes(root_id(graph, "plugins"));

    assert_eq!(result_types(graph, &elements), vec!["Audit", "Cache"]);
    assert_eq!(output.diagnostics.count(DiagnosticKind::OverrideWarning), 0);
}

#[test]
fn test_unique_and_untagged_bindings_are_additive() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Audit")).implementing(ty("IPlugin")))
        .with(TypeDescriptor::concrete(ty("Cache")).implementing(ty("IPlugin")))
        .with(TypeDescriptor::concrete(ty("Metrics")).implementing(ty("IPlugin")));
    let bindings = vec![
        Binding::to(ty("IPlugin"), ty("Audit")).with_tag(Tag::Unique),
        Binding::to(ty("IPlugin"), ty("Cache")),
        Binding::to(ty("IPlugin"), ty("Metrics")).with_tag(Tag::Unique),
    ];

    let output = resolve(catalog, bindings, &[Root::new("plugins", ty("List<IPlugin>"))], &[]);
    let graph = &output.graph;
    let elements = graph.dependency_nodes(root_id(graph, "plugins"));

    assert_eq!(result_types(graph, &elements), vec!["Audit", "Cache", "Metrics"]);
}

#[test]
fn test_auto_binding_synthesizes_one_transient_binding() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Clock")))
        .with(component("Scheduler", &[("first", "Clock"), ("second", "Clock")]));
    let roots = [Root::new("clock", ty("Clock")), Root::new("scheduler", ty("Scheduler"))];

    let output = resolve(catalog, Vec::new(), &roots, &[]);
    let graph = &output.graph;

    let clocks: Vec<_> = graph
        .synthesized()
        .iter()
        .filter(|b| b.contract == ty("Clock"))
        .collect();
    assert_eq!(clocks.len(), 1);
    assert_eq!(clocks[0].lifetime, Lifetime::Transient);
    assert_eq!(clocks[0].implementation_type(), Some(&ty("Clock")));
    assert_eq!(graph.nodes_for(&ty("Clock")).count(), 3);
    assert!(output.is_valid());
}

#[test]
fn test_accumulator_collects_dependencies_before_dependents() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("D")).implementing(ty("ITracked")))
        .with(
            component("S", &[("d", "D"), ("tracker", "Tracker<ITracked>")])
                .implementing(ty("ITracked")),
        );
    let accumulators = [AccumulatorSpec::new(
        ty("ITracked"),
        ty("Tracker<ITracked>"),
        Vec::new(),
    )];

    let output = resolve(catalog, Vec::new(), &[Root::new("s", ty("S"))], &accumulators);
    let graph = &output.graph;

    assert!(output.is_valid());
    assert_eq!(output.accumulators.len(), 1);
    let instance = &output.accumulators[0];
    assert_eq!(instance.scope, AccumulatorScope::Resolve { root: "s".to_string() });
    assert_eq!(result_types(graph, &instance.members), vec!["D", "S"]);

    let tracker = dependency(graph, root_id(graph, "s"), "tracker");
    assert_eq!(graph.node(tracker).unwrap().kind, NodeKind::Accumulator { spec: 0 });
}

#[test]
fn test_singleton_capturing_per_resolve_is_a_conflict() {
    let catalog = TypeCatalog::new()
        .with(TypeDescriptor::concrete(ty("Session")).implementing(ty("ISession")))
        .with(component("Cache", &[("session", "ISession")]))
        .with(component("LazyCache", &[("session", "Func<ISession>")]));
    let bindings = vec![
        Binding::to(ty("ISession"), ty("Session")).with_lifetime(Lifetime::PerResolve),
        Binding::to(ty("Cache"), ty("Cache")).with_lifetime(Lifetime::Singleton),
        Binding::to(ty("LazyCache"), ty("LazyCache")).with_lifetime(Lifetime::Singleton),
    ];
    let roots = [Root::new("cache", ty("Cache")), Root::new("lazy", ty("LazyCache"))];

    let output = resolve(catalog.clone(), bindings.clone(), &roots, &[]);
    let conflicts: Vec<_> = output
        .diagnostics
        .of_kind(DiagnosticKind::LifetimeConflict)
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].message.contains("Cache"));
    assert!(conflicts[0].is_error());

    let mut registry = BindingRegistryImpl::new(catalog);
    registry.register_all(bindings);
    let relaxed = ResolveOptions {
        strict_lifetimes: false,
        ..ResolveOptions::default()
    };
    let output = ResolutionEngine::new(relaxed).resolve(&registry, &roots, &[]);
    assert_eq!(output.diagnostics.count(DiagnosticKind::LifetimeConflict), 1);
    assert!(output.is_valid());
}

#[test]
fn test_unresolved_root_is_reported_with_sentinel() {
    let catalog = TypeCatalog::new().with(TypeDescriptor::abstraction(ty("IMissing")));

    let output = resolve(catalog, Vec::new(), &[Root::new("missing", ty("IMissing"))], &[]);

    assert!(matches!(
        output.graph.root("missing").unwrap().target,
        DependencyTarget::Unresolved(_)
    ));
    assert_eq!(output.graph.unresolved().len(), 1);
    assert_eq!(output.diagnostics.count(DiagnosticKind::Unresolved), 1);
    assert!(!output.graph.is_complete());
}

#[test]
fn test_registry_is_an_explicit_value() {
    let catalog = TypeCatalog::new().with(TypeDescriptor::concrete(ty("Worker")));
    let mut first = BindingRegistryImpl::new(catalog.clone());
    first.register(Binding::to(ty("Worker"), ty("Worker")).with_lifetime(Lifetime::Singleton));
    let second = BindingRegistryImpl::new(catalog);

    let roots = [Root::new("worker", ty("Worker"))];
    let engine = ResolutionEngine::default();
    let shared = engine.resolve(&first, &roots, &[]);
    let synthesized = engine.resolve(&second, &roots, &[]);

    assert_eq!(shared.graph.root_node("worker").unwrap().lifetime, Lifetime::Singleton);
    assert_eq!(synthesized.graph.root_node("worker").unwrap().lifetime, Lifetime::Transient);
    assert!(shared.graph.synthesized().is_empty());
    assert_eq!(synthesized.graph.synthesized().len(), 1);
}

#[test]
fn test_composition_from_toml_setup() -> Result<()> {
    let setup = CompositionSetup::from_toml_str(
        r#"
[[types]]
name = "Clock"
implements = ["IClock"]

[[types]]
name = "Reporter"

[[types.constructors]]
params = [
    { name = "clock", type = "IClock" },
    { name = "clocks", type = "Enumerable<IClock>" },
]

[[bindings]]
tags = ["utc", "local"]
lifetime = "Singleton"
implementation = { type = "Clock" }

[[bindings]]
contracts = ["IClock"]
implementation = { type = "Clock" }

[[roots]]
name = "reporter"
type = "Reporter"
"#,
    )?;

    let composition = CompositionBuilder::from_setup(setup).build()?;
    composition.validate()?;

    let graph = composition.graph();
    let reporter = root_id(graph, "reporter");
    let clocks = dependency(graph, reporter, "clocks");
    // IClock 的两个带标签绑定，再加上无标签的 IClock
    assert_eq!(graph.dependency_nodes(clocks).len(), 3);
    assert_eq!(
        graph.node(dependency(graph, reporter, "clock")).unwrap().lifetime,
        Lifetime::Transient
    );
    assert_eq!(composition.registry().len(), 5);
    Ok(())
}
