//! 组合构建器与选项加载测试

use crate::builder::{CompositionBuilder, LoggingConfig};
use crate::options::OptionsLoader;
use crate::setup::{BindingDeclaration, CompositionSetup};
use di_abstractions::{ResolveOptions, Root};
use di_common::{
    ConstructorDescriptor, DiagnosticKind, InjectionSite, Lifetime, SetupError, TypeDescriptor,
    TypeRef,
};
use std::io::Write;

fn ty(text: &str) -> TypeRef {
    text.parse().unwrap()
}

fn service_setup() -> CompositionSetup {
    CompositionSetup::new()
        .with_type(TypeDescriptor::concrete(ty("Config")).implementing(ty("IConfig")))
        .with_type(
            TypeDescriptor::concrete(ty("Service")).with_constructor(ConstructorDescriptor::new(
                vec![InjectionSite::parameter("config", ty("IConfig"))],
            )),
        )
        .with_binding(
            BindingDeclaration::bind(ty("IConfig"), ty("Config")).with_lifetime(Lifetime::Singleton),
        )
        .with_root(Root::new("service", ty("Service")))
}

#[test]
fn test_build_and_describe_root() {
    let composition = CompositionBuilder::from_setup(service_setup())
        .build()
        .expect("组合应该构建成功");

    assert!(composition.is_valid());
    assert!(composition.validate().is_ok());
    assert_eq!(
        composition.describe_root("service").unwrap(),
        "service: Service [Transient]\n  config: IConfig [Singleton] = Config\n"
    );
    assert!(composition.describe_root("missing").is_none());
}

#[test]
fn test_construction_order_puts_dependencies_first() {
    let composition = CompositionBuilder::from_setup(service_setup()).build().unwrap();
    let graph = composition.graph();

    let order = composition.construction_order().unwrap();
    let names: Vec<String> = order
        .iter()
        .map(|id| graph.node(*id).unwrap().contract.to_string())
        .collect();
    assert_eq!(names, vec!["IConfig", "Service"]);
}

#[test]
fn test_validate_reports_unresolved_dependencies() {
    let setup = CompositionSetup::new()
        .with_type(TypeDescriptor::abstraction(ty("IClock")))
        .with_type(
            TypeDescriptor::concrete(ty("Service")).with_constructor(ConstructorDescriptor::new(
                vec![InjectionSite::parameter("clock", ty("IClock"))],
            )),
        )
        .with_root(Root::new("service", ty("Service")));

    let composition = CompositionBuilder::from_setup(setup).build().unwrap();
    assert_eq!(composition.errors().len(), 1);
    match composition.validate() {
        Err(SetupError::ValidationFailed { errors }) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("Unresolved"));
            assert!(errors[0].contains("Service.ctor:clock"));
        }
        other => panic!("期望验证失败，实际: {:?}", other),
    }
    assert!(composition
        .describe_root("service")
        .unwrap()
        .contains("clock: <未解析 IClock>"));
}

#[test]
fn test_explicit_options_take_precedence() {
    let options = ResolveOptions {
        auto_binding: false,
        ..ResolveOptions::default()
    };
    let composition = CompositionBuilder::from_setup(service_setup())
        .with_options(options)
        .with_options_loader(OptionsLoader::new().without_env())
        .build()
        .unwrap();

    assert!(!composition.options().auto_binding);
    assert_eq!(composition.diagnostics().count(DiagnosticKind::Unresolved), 1);
}

#[test]
fn test_override_warnings_are_collected() {
    let composition = CompositionBuilder::from_setup(service_setup())
        .bind(BindingDeclaration::bind(ty("IConfig"), ty("Config")))
        .build()
        .unwrap();

    assert!(composition.is_valid());
    assert_eq!(composition.warnings().len(), 1);
    assert_eq!(composition.warnings()[0].kind, DiagnosticKind::OverrideWarning);
}

#[test]
fn test_add_setup_files() {
    let missing = CompositionBuilder::new().add_setup_toml("/nonexistent/composition.toml");
    assert!(matches!(missing, Err(SetupError::FileNotFound { .. })));

    let json = serde_json::json!({
        "types": [{ "name": "Worker" }],
        "roots": [{ "name": "worker", "type": "Worker" }]
    });
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.to_string().as_bytes()).unwrap();

    let composition = CompositionBuilder::new()
        .add_setup_json(file.path())
        .unwrap()
        .build()
        .unwrap();
    assert!(composition.is_valid());
    assert_eq!(composition.graph().synthesized().len(), 1);
    assert!(composition.graph_json().unwrap().contains("\"nodes\""));
}

#[test]
fn test_options_loader_reads_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"max_depth = 7\nauto_binding = false\n").unwrap();

    let options = OptionsLoader::new()
        .without_env()
        .with_file(file.path())
        .load()
        .unwrap();
    assert_eq!(options.max_depth, 7);
    assert!(!options.auto_binding);
    assert!(options.wildcard_tag_matching);
}

#[test]
fn test_options_loader_layers_environment_over_base() {
    std::env::set_var("DICOMPTEST_MAX_DEPTH", "9");
    std::env::set_var("DICOMPTEST_DEFAULT_LIFETIME", "Singleton");

    let base = ResolveOptions {
        max_depth: 3,
        strict_lifetimes: false,
        ..ResolveOptions::default()
    };
    let options = OptionsLoader::new()
        .with_env_prefix("DICOMPTEST")
        .load_over(&base)
        .unwrap();

    std::env::remove_var("DICOMPTEST_MAX_DEPTH");
    std::env::remove_var("DICOMPTEST_DEFAULT_LIFETIME");

    assert_eq!(options.max_depth, 9);
    assert_eq!(options.default_lifetime, Lifetime::Singleton);
    assert!(!options.strict_lifetimes);
}

#[test]
fn test_options_loader_keeps_setup_options() {
    let mut setup = service_setup();
    setup.options = Some(ResolveOptions {
        default_lifetime: Lifetime::PerResolve,
        ..ResolveOptions::default()
    });

    let composition = CompositionBuilder::from_setup(setup)
        .with_options_loader(OptionsLoader::new().without_env())
        .build()
        .unwrap();
    assert_eq!(composition.options().default_lifetime, Lifetime::PerResolve);
}

#[test]
fn test_logging_config_presets() {
    let development = LoggingConfig::development();
    assert_eq!(development.level, tracing::Level::DEBUG);
    assert!(!development.json_format);

    let production = LoggingConfig::production();
    assert_eq!(production.level, tracing::Level::INFO);
    assert!(production.json_format);
}
