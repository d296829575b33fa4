//! 组合构建器

use crate::composition::Composition;
use crate::options::OptionsLoader;
use crate::setup::{BindingDeclaration, CompositionSetup};
use di_abstractions::{AccumulatorSpec, BindingRegistry, ResolveOptions, Root};
use di_common::{Diagnostics, SetupError, SetupResult, TypeDescriptor};
use di_impl::{BindingRegistryImpl, ResolutionEngine};
use std::path::Path;
use tracing::{debug, info};

/// 组合构建器
///
/// 收集组合配置与选项，构建时完成注册与解析
pub struct CompositionBuilder {
    /// 累积的组合配置
    setup: CompositionSetup,
    /// 选项加载器，设置后在配置中的选项之上叠加文件与环境变量
    options_loader: Option<OptionsLoader>,
    /// 显式选项，优先级最高
    options: Option<ResolveOptions>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl CompositionBuilder {
    /// 创建新的组合构建器
    pub fn new() -> Self {
        Self {
            setup: CompositionSetup::default(),
            options_loader: None,
            options: None,
            logging_enabled: false, // 默认不启用日志初始化
            logging_config: LoggingConfig::default(),
        }
    }

    /// 从已有组合配置开始
    pub fn from_setup(setup: CompositionSetup) -> Self {
        Self {
            setup,
            ..Self::new()
        }
    }

    /// 添加 TOML 组合配置文件
    pub fn add_setup_toml<P: AsRef<Path>>(self, path: P) -> SetupResult<Self> {
        self.add_setup_file(path.as_ref(), "toml")
    }

    /// 添加 JSON 组合配置文件
    pub fn add_setup_json<P: AsRef<Path>>(self, path: P) -> SetupResult<Self> {
        self.add_setup_file(path.as_ref(), "json")
    }

    fn add_setup_file(mut self, path: &Path, format: &str) -> SetupResult<Self> {
        if !path.exists() {
            return Err(SetupError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        info!("添加 {} 组合配置文件: {}", format, path.display());
        let text = std::fs::read_to_string(path)?;
        let setup = match format {
            "toml" => CompositionSetup::from_toml_str(&text)?,
            _ => CompositionSetup::from_json_str(&text)?,
        };
        self.setup.merge(setup);
        Ok(self)
    }

    /// 合并组合配置
    pub fn add_setup(mut self, setup: CompositionSetup) -> Self {
        self.setup.merge(setup);
        self
    }

    /// 添加类型描述符
    pub fn add_type(mut self, descriptor: TypeDescriptor) -> Self {
        debug!("添加类型描述符: {}", descriptor.ty);
        self.setup.types.add(descriptor);
        self
    }

    /// 添加绑定声明
    pub fn bind(mut self, declaration: impl Into<BindingDeclaration>) -> Self {
        self.setup.bindings.push(declaration.into());
        self
    }

    /// 添加根
    pub fn root(mut self, root: Root) -> Self {
        self.setup.roots.push(root);
        self
    }

    /// 添加累加器
    pub fn accumulate(mut self, accumulator: AccumulatorSpec) -> Self {
        self.setup.accumulators.push(accumulator);
        self
    }

    /// 使用选项加载器
    pub fn with_options_loader(mut self, loader: OptionsLoader) -> Self {
        self.options_loader = Some(loader);
        self
    }

    /// 使用显式选项
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true; // 启用日志初始化
        self
    }

    /// 构建组合
    ///
    /// 解析问题以诊断形式保存在组合中，只有配置本身无法使用时才返回错误
    pub fn build(self) -> SetupResult<Composition> {
        // 只有在明确配置了日志时才初始化日志
        if self.logging_enabled {
            self.logging_config.init()?;
        }

        info!("开始构建组合");
        let options = match (&self.options, &self.options_loader) {
            (Some(options), _) => options.clone(),
            (None, Some(loader)) => loader.load_over(&self.setup.resolve_options())?,
            (None, None) => self.setup.resolve_options(),
        };

        let CompositionSetup {
            types,
            roots,
            accumulators,
            ..
        } = self.setup.clone();
        let mut registry = BindingRegistryImpl::new(types);
        let expanded = self.setup.expand(&options, registry.unifier());

        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(expanded.diagnostics);
        diagnostics.extend(registry.register_all(expanded.bindings));

        let output = ResolutionEngine::new(options.clone()).resolve(&registry, &roots, &accumulators);
        diagnostics.extend(output.diagnostics.clone());

        info!(
            "组合构建完成: {} 个绑定, {} 个根",
            registry.len(),
            roots.len()
        );
        Ok(Composition::new(
            registry,
            roots,
            accumulators,
            options,
            output,
            diagnostics,
        ))
    }
}

impl Default for CompositionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 初始化全局日志订阅者，已初始化时返回错误
    pub fn init(&self) -> SetupResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| SetupError::OptionsError {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
