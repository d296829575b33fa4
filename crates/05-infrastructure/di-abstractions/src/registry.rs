//! 绑定注册表抽象接口

use crate::catalog::TypeCatalog;
use crate::resolver::ResolveOptions;
use crate::unifier::{Substitution, TypeUnifier};
use di_common::{
    BindingId, Diagnostic, Diagnostics, InjectionSite, Lifetime, SourceRef, Tag, TagKey, TagValue,
    TypeRef,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 实现描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    /// 通过类型的构造函数创建，构造函数由元数据目录选择
    Type(TypeRef),
    /// 显式工厂，带有自己的注入点
    Factory {
        label: String,
        #[serde(default)]
        sites: Vec<InjectionSite>,
    },
    /// 组合参数，由外部提供
    Arg { name: String },
}

/// 绑定声明
///
/// 创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// 契约类型
    pub contract: TypeRef,
    /// 标签
    #[serde(default)]
    pub tag: Option<Tag>,
    /// 生命周期
    #[serde(default)]
    pub lifetime: Lifetime,
    /// 实现描述
    pub implementation: Implementation,
    /// 源位置
    #[serde(default)]
    pub location: Option<SourceRef>,
}

impl Binding {
    /// 创建瞬时、无标签的绑定
    pub fn new(contract: TypeRef, implementation: Implementation) -> Self {
        Self {
            contract,
            tag: None,
            lifetime: Lifetime::Transient,
            implementation,
            location: None,
        }
    }

    /// 绑定契约到实现类型
    pub fn to(contract: TypeRef, implementation: TypeRef) -> Self {
        Self::new(contract, Implementation::Type(implementation))
    }

    /// 设置标签
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// 设置生命周期
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// 设置源位置
    pub fn with_location(mut self, location: SourceRef) -> Self {
        self.location = Some(location);
        self
    }

    /// 实现类型（仅类型实现）
    pub fn implementation_type(&self) -> Option<&TypeRef> {
        match &self.implementation {
            Implementation::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

/// 根声明：对外暴露的组合入口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// 根名称
    pub name: String,
    #[serde(rename = "type")]
    pub contract: TypeRef,
    #[serde(default)]
    pub tag: Option<TagValue>,
    #[serde(default)]
    pub location: Option<SourceRef>,
}

impl Root {
    /// 创建根
    pub fn new(name: impl Into<String>, contract: TypeRef) -> Self {
        Self {
            name: name.into(),
            contract,
            tag: None,
            location: None,
        }
    }

    /// 按标签请求根
    pub fn with_tag(mut self, tag: TagValue) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// 累加器声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorSpec {
    /// 收集的契约类型
    pub contract: TypeRef,
    /// 累加器类型
    pub accumulator: TypeRef,
    /// 适用的生命周期，为空表示全部
    #[serde(default)]
    pub lifetimes: Vec<Lifetime>,
}

impl AccumulatorSpec {
    /// 创建累加器声明，生命周期集合为空时收集所有生命周期
    pub fn new(contract: TypeRef, accumulator: TypeRef, lifetimes: Vec<Lifetime>) -> Self {
        Self {
            contract,
            accumulator,
            lifetimes,
        }
    }

    /// 生命周期是否适用
    pub fn applies_to(&self, lifetime: Lifetime) -> bool {
        self.lifetimes.is_empty() || self.lifetimes.contains(&lifetime)
    }
}

/// 查找请求
#[derive(Debug, Clone, Copy)]
pub struct LookupRequest<'a> {
    /// 请求的契约类型
    pub contract: &'a TypeRef,
    /// 请求的标签
    pub tag: Option<&'a TagValue>,
    /// 注入点全路径，位置规则据此匹配
    pub site_path: Option<&'a str>,
}

impl<'a> LookupRequest<'a> {
    /// 创建不带标签的查找请求
    pub fn new(contract: &'a TypeRef) -> Self {
        Self {
            contract,
            tag: None,
            site_path: None,
        }
    }

    /// 设置请求的标签
    pub fn tagged(mut self, tag: Option<&'a TagValue>) -> Self {
        self.tag = tag;
        self
    }

    /// 设置注入点路径
    pub fn at_site(mut self, site_path: Option<&'a str>) -> Self {
        self.site_path = site_path;
        self
    }
}

/// 标签匹配方式，按优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MatchKind {
    /// 标签精确相等
    Exact,
    /// 位置规则匹配
    TagOn,
    /// 唯一标签
    Unique,
    /// 类型标签
    TypeMarker,
    /// 通配标签
    Wildcard,
    /// 无标签回退
    Fallback,
}

/// 查找结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingMatch {
    /// 命中的绑定
    pub binding: BindingId,
    /// 契约合一得到的替换
    pub substitution: Substitution,
    /// 命中的优先级
    pub kind: MatchKind,
    /// 命中的位置规则模式
    pub pattern: Option<String>,
}

/// 绑定注册表 trait
///
/// 注册表是显式传入解析过程的值，不存在进程级全局状态
pub trait BindingRegistry: Send + Sync {
    /// 注册绑定；相同（契约，标签）键的后声明绑定覆盖先声明的，并返回覆盖警告
    fn register(&mut self, binding: Binding) -> (BindingId, Option<Diagnostic>);

    /// 获取绑定
    fn binding(&self, id: BindingId) -> Option<&Binding>;

    /// 所有绑定（声明顺序）
    fn bindings(&self) -> &[Binding];

    /// 绑定的标签键
    fn tag_key(&self, id: BindingId) -> TagKey;

    /// 查找满足请求的绑定
    fn lookup(&self, request: &LookupRequest<'_>, options: &ResolveOptions) -> Option<BindingMatch>;

    /// 契约可合一的所有绑定（任意标签、声明顺序、包含被覆盖的绑定）
    fn all_for_contract(&self, element: &TypeRef) -> Vec<BindingMatch>;

    /// 能力查询：实现类型具备全部指定能力的绑定
    fn bindings_implementing(&self, capabilities: &[TypeRef]) -> Vec<BindingId>;

    /// 所有位置规则（绑定，模式）
    fn tag_on_rules(&self) -> Vec<(BindingId, String)>;

    /// 与请求的契约和注入点路径都匹配的位置规则，无论查找时是否胜出
    fn matching_tag_on_rules(&self, request: &LookupRequest<'_>) -> Vec<(BindingId, String)>;

    /// 从未命中过的位置规则
    fn unused_tag_on_rules(&self, used: &HashSet<(BindingId, String)>) -> Vec<(BindingId, String)> {
        self.tag_on_rules()
            .into_iter()
            .filter(|rule| !used.contains(rule))
            .collect()
    }

    /// 注册表级结构校验，每个有问题的声明产生一条诊断
    fn validate(&self) -> Diagnostics;

    /// 类型元数据目录
    fn catalog(&self) -> &TypeCatalog;

    /// 类型合一器
    fn unifier(&self) -> &dyn TypeUnifier;
}
