//! # 依赖注入具体实现
//!
//! 提供编译期依赖解析引擎的具体实现：绑定注册表、类型合一器、隐式绑定合成器、
//! 对象图构建器、生命周期校验、循环与完整性检查以及累加器收集

pub mod accumulator;
pub mod builder;
pub mod cycle;
pub mod engine;
pub mod lifetime;
pub mod registry;
pub mod synthesizer;
pub mod unifier;

pub use accumulator::DefaultAccumulatorCollector;
pub use builder::GraphBuilder;
pub use cycle::DefaultCircularDependencyDetector;
pub use engine::{ResolutionEngine, ResolutionOutput};
pub use lifetime::DefaultLifetimeValidator;
pub use registry::BindingRegistryImpl;
pub use synthesizer::{ConstructorChoice, ImplicitBindingSynthesizer, ImplicitPlan};
pub use unifier::StructuralUnifier;
