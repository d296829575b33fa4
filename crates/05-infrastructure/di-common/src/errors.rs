//! 错误类型定义

use thiserror::Error;

/// 类型表示法解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("类型表示为空")]
    Empty,

    #[error("类型表示 `{input}` 在位置 {position} 处出现意外字符 '{found}'")]
    UnexpectedChar {
        input: String,
        position: usize,
        found: char,
    },

    #[error("类型表示 `{input}` 意外结束")]
    UnexpectedEnd { input: String },

    #[error("类型 {name} 需要 {expected} 个类型参数，实际 {found} 个")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("标签表示无效: {text}")]
    InvalidTag { text: String },
}

/// 组合配置错误类型
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("类型解析失败: {source}")]
    TypeError {
        #[from]
        source: TypeParseError,
    },

    #[error("选项加载失败: {message}")]
    OptionsError { message: String },

    #[error("声明无效: {message}")]
    InvalidDeclaration { message: String },

    #[error("组合验证失败: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// 对象图错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("对象图中存在循环: {cycle}")]
    CycleDetected { cycle: String },

    #[error("节点不存在: {id}")]
    NodeNotFound { id: usize },
}

/// 实例释放错误类型
#[derive(Error, Debug)]
pub enum DisposeError {
    #[error("实例释放失败: {label}, 原因: {source}")]
    DisposeFailed {
        label: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("作用域已释放: {scope}")]
    ScopeDisposed { scope: String },
}

/// 结果类型别名
pub type TypeParseResult<T> = Result<T, TypeParseError>;
/// 组合配置结果类型
pub type SetupResult<T> = Result<T, SetupError>;
/// 对象图结果类型
pub type GraphResult<T> = Result<T, GraphError>;
/// 释放结果类型
pub type DisposeResult<T> = Result<T, DisposeError>;
