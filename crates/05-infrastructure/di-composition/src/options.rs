//! 解析选项加载
//!
//! 按以下顺序叠加配置源，后者覆盖前者：
//!
//! 1. 基础选项（默认值或组合配置中的 `options`）
//! 2. 可选的选项文件（按扩展名识别 TOML / JSON）
//! 3. 带前缀的环境变量，例如 `DI_MAX_DEPTH=50`、`DI_AUTO_BINDING=false`

use di_abstractions::ResolveOptions;
use di_common::{SetupError, SetupResult};
use std::path::PathBuf;
use tracing::{debug, error};

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "DI";

/// 解析选项加载器
#[derive(Debug, Clone)]
pub struct OptionsLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for OptionsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsLoader {
    /// 创建使用默认环境变量前缀的加载器
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    /// 添加选项文件，文件不存在时忽略
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// 设置环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// 不读取环境变量
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// 以默认选项为基础加载
    pub fn load(&self) -> SetupResult<ResolveOptions> {
        self.load_over(&ResolveOptions::default())
    }

    /// 以给定选项为基础加载
    pub fn load_over(&self, base: &ResolveOptions) -> SetupResult<ResolveOptions> {
        let defaults = config::Config::try_from(base).map_err(options_error)?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = &self.file {
            debug!("添加选项文件: {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }
        if let Some(prefix) = &self.env_prefix {
            debug!("添加环境变量选项源，前缀: {}", prefix);
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .try_parsing(true),
            );
        }

        let settings = builder.build().map_err(|e| {
            error!("选项构建失败: {}", e);
            options_error(e)
        })?;
        let options: ResolveOptions = settings.try_deserialize().map_err(|e| {
            error!("选项绑定失败: {}", e);
            options_error(e)
        })?;

        debug!("解析选项加载完成: {:?}", options);
        Ok(options)
    }
}

fn options_error(e: config::ConfigError) -> SetupError {
    SetupError::OptionsError {
        message: e.to_string(),
    }
}
