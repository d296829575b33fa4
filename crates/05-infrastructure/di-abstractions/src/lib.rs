//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义编译期依赖解析的核心接口和输出模型。
//!
//! ## 核心接口
//!
//! - [`BindingRegistry`] - 绑定注册表接口
//! - [`TypeUnifier`] - 类型合一接口
//! - [`CircularDependencyDetector`] - 循环依赖检测接口
//! - [`LifetimeValidator`] - 生命周期校验接口
//! - [`AccumulatorCollector`] - 累加器收集接口
//!
//! ## 输出模型
//!
//! - [`Graph`] - 以索引寻址的对象构造图
//! - [`Node`] - 一个已解析的构造步骤

pub mod accumulator;
pub mod catalog;
pub mod graph;
pub mod registry;
pub mod resolver;
pub mod unifier;
pub mod validation;

pub use accumulator::*;
pub use catalog::*;
pub use graph::*;
pub use registry::*;
pub use resolver::*;
pub use unifier::*;
pub use validation::*;
