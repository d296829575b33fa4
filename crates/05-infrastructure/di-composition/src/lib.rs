//! # 依赖解析组合层
//!
//! 把类型元数据、绑定声明、根与累加器组合成一次完整的解析，
//! 并提供代码生成器产出的构造代码所需的运行时支持类型。
//!
//! ## 主要功能
//!
//! - **组合配置**: 从 TOML / JSON 读取声明并展开为绑定
//! - **选项加载**: 叠加默认值、选项文件与环境变量
//! - **组合构建器**: 注册绑定、运行解析引擎并汇总诊断
//! - **运行时支持**: 单例槽、释放作用域、惰性序列、工厂函数、所有权包装
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_composition::{CompositionBuilder, LoggingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let composition = CompositionBuilder::new()
//!         .add_setup_toml("composition.toml")?
//!         .with_logging(LoggingConfig::development())
//!         .build()?;
//!
//!     composition.validate()?;
//!     if let Some(tree) = composition.describe_root("service") {
//!         println!("{}", tree);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod composition;
pub mod options;
pub mod runtime;
pub mod setup;

#[cfg(test)]
mod tests;

// 重新导出主要类型
pub use builder::{CompositionBuilder, LoggingConfig};
pub use composition::Composition;
pub use options::{OptionsLoader, DEFAULT_ENV_PREFIX};
pub use runtime::{CachedSequence, Deferred, Disposable, DisposalScope, Owned, SingletonSlot};
pub use setup::{
    AllImplementationsDeclaration, BindingDeclaration, CompositionSetup, DefaultLifetime,
    ExpandedSetup,
};

// 重新导出错误类型
pub use di_common::{DisposeError, SetupError};
