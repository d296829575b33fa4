//! 解析诊断信息
//!
//! 解析过程从不中途终止，所有问题都以诊断形式累积并随尽力构建的对象图一并返回

use crate::ids::{BindingId, NodeId, UnresolvedId};
use crate::metadata::SourceRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 诊断种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// 没有任何绑定或合成规则可满足的请求
    Unresolved,
    /// 循环依赖
    CyclicDependency,
    /// 结构性误用
    InvalidMetadata,
    /// 更窄范围的依赖被更宽范围的节点捕获
    LifetimeConflict,
    /// 相同键的绑定被后声明的绑定覆盖
    OverrideWarning,
    /// 位置规则未匹配任何注入点
    UnusedTagOnWarning,
}

impl DiagnosticKind {
    /// 默认严重程度
    pub fn default_severity(self) -> Severity {
        match self {
            Self::Unresolved
            | Self::CyclicDependency
            | Self::InvalidMetadata
            | Self::LifetimeConflict => Severity::Error,
            Self::OverrideWarning | Self::UnusedTagOnWarning => Severity::Warning,
        }
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 诊断关联对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticTarget {
    Node(NodeId),
    Edge { node: NodeId, site: usize },
    Binding(BindingId),
    Unresolved(UnresolvedId),
    Root(String),
}

/// 诊断记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 诊断种类
    pub kind: DiagnosticKind,
    /// 严重级别
    pub severity: Severity,
    /// 诊断消息
    pub message: String,
    /// 声明位置
    pub location: Option<SourceRef>,
    /// 关联的对象图元素
    pub target: Option<DiagnosticTarget>,
}

impl Diagnostic {
    /// 以默认严重程度创建诊断
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            location: None,
            target: None,
        }
    }

    /// 设置严重程度
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置源位置
    pub fn at(mut self, location: Option<SourceRef>) -> Self {
        self.location = location;
        self
    }

    /// 设置关联对象
    pub fn on(mut self, target: DiagnosticTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// 是否为错误级别
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.severity, self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

/// 诊断列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// 创建空的诊断集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加诊断
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// 合并另一组诊断
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// 诊断数量
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否没有诊断
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 按产生顺序迭代
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// 是否包含错误
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// 所有错误
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    /// 所有警告
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// 指定种类的诊断
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// 指定种类的诊断数量
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
