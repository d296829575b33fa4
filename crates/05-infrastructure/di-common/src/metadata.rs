//! 元数据定义
//!
//! 由外部元数据提取器提供的类型、构造函数和注入点信息

use crate::tag::TagValue;
use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 调用方提供的源位置引用，诊断信息原样回传
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

impl SourceRef {
    /// 创建声明位置
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 注入点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// 构造函数参数
    #[default]
    ConstructorParameter,
    /// 属性
    Property,
    /// 字段
    Field,
    /// 方法参数
    MethodParameter,
    /// 引擎合成的边（集合元素、工厂目标、元组分量等）
    Implicit,
}

/// 依赖请求点
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionSite {
    /// 注入点种类
    #[serde(default)]
    pub kind: SiteKind,
    /// 所属成员（构造函数为 `ctor`）
    #[serde(default = "default_member")]
    pub member: String,
    /// 参数、属性或字段名称
    pub name: String,
    /// 所需契约类型
    #[serde(rename = "type")]
    pub contract: TypeRef,
    /// 标签覆盖
    #[serde(default)]
    pub tag: Option<TagValue>,
    /// 显式序号
    #[serde(default)]
    pub ordinal: Option<i32>,
    /// 源位置
    #[serde(default)]
    pub location: Option<SourceRef>,
}

fn default_member() -> String {
    "ctor".to_string()
}

impl InjectionSite {
    /// 创建构造函数参数注入点
    pub fn parameter(name: impl Into<String>, contract: TypeRef) -> Self {
        Self {
            kind: SiteKind::ConstructorParameter,
            member: default_member(),
            name: name.into(),
            contract,
            tag: None,
            ordinal: None,
            location: None,
        }
    }

    /// 创建属性注入点
    pub fn property(name: impl Into<String>, contract: TypeRef) -> Self {
        let name = name.into();
        Self {
            kind: SiteKind::Property,
            member: name.clone(),
            name,
            ..Self::parameter(String::new(), contract)
        }
    }

    /// 创建字段注入点
    pub fn field(name: impl Into<String>, contract: TypeRef) -> Self {
        Self {
            kind: SiteKind::Field,
            ..Self::property(name, contract)
        }
    }

    /// 创建方法参数注入点
    pub fn method_parameter(
        method: impl Into<String>,
        name: impl Into<String>,
        contract: TypeRef,
    ) -> Self {
        Self {
            kind: SiteKind::MethodParameter,
            member: method.into(),
            ..Self::parameter(name, contract)
        }
    }

    /// 创建引擎合成的注入点
    pub fn implicit(name: impl Into<String>, contract: TypeRef) -> Self {
        Self {
            kind: SiteKind::Implicit,
            member: "implicit".to_string(),
            ..Self::parameter(name, contract)
        }
    }

    /// 设置标签覆盖
    pub fn with_tag(mut self, tag: TagValue) -> Self {
        self.tag = Some(tag);
        self
    }

    /// 设置序号
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// 设置源位置
    pub fn with_location(mut self, location: SourceRef) -> Self {
        self.location = Some(location);
        self
    }

    /// 注入点全路径，位置规则据此匹配：`<consumer>.<member>:<name>`
    pub fn path(&self, consumer: &TypeRef) -> String {
        format!("{}.{}:{}", consumer, self.member, self.name)
    }

    /// 以新的契约类型复制注入点
    pub fn with_contract(&self, contract: TypeRef) -> Self {
        Self {
            contract,
            ..self.clone()
        }
    }
}

/// 构造函数描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDescriptor {
    /// 是否公开
    #[serde(default = "default_true")]
    pub public: bool,
    /// 显式序号标记
    #[serde(default)]
    pub ordinal: Option<i32>,
    /// 参数列表
    #[serde(default)]
    pub params: Vec<InjectionSite>,
}

fn default_true() -> bool {
    true
}

impl ConstructorDescriptor {
    /// 创建公开构造函数
    pub fn new(params: Vec<InjectionSite>) -> Self {
        Self {
            public: true,
            ordinal: None,
            params,
        }
    }

    /// 无参构造函数
    pub fn parameterless() -> Self {
        Self::new(Vec::new())
    }

    /// 设置序号标记
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// 设为非公开
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

/// 类型描述符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// 类型（可含泛型标记）
    #[serde(rename = "name")]
    pub ty: TypeRef,
    /// 是否为可构造的具体类型
    #[serde(default = "default_true")]
    pub concrete: bool,
    /// 实例是否需要释放
    #[serde(default)]
    pub disposable: bool,
    /// 实现的能力集合
    #[serde(default)]
    pub implements: Vec<TypeRef>,
    /// 构造函数列表，为空时视为一个公开的无参构造函数
    #[serde(default)]
    pub constructors: Vec<ConstructorDescriptor>,
    /// 成员注入点（属性、字段、方法参数）
    #[serde(default)]
    pub members: Vec<InjectionSite>,
}

impl TypeDescriptor {
    /// 创建具体类型描述符
    pub fn concrete(ty: TypeRef) -> Self {
        Self {
            ty,
            concrete: true,
            disposable: false,
            implements: Vec::new(),
            constructors: Vec::new(),
            members: Vec::new(),
        }
    }

    /// 创建抽象类型描述符
    pub fn abstraction(ty: TypeRef) -> Self {
        Self {
            concrete: false,
            ..Self::concrete(ty)
        }
    }

    /// 添加实现的能力
    pub fn implementing(mut self, capability: TypeRef) -> Self {
        self.implements.push(capability);
        self
    }

    /// 添加构造函数
    pub fn with_constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// 添加成员注入点
    pub fn with_member(mut self, site: InjectionSite) -> Self {
        self.members.push(site);
        self
    }

    /// 标记为需要释放
    pub fn disposable(mut self) -> Self {
        self.disposable = true;
        self
    }

    /// 按序号排列的成员注入点，无序号的排在最后并保持声明顺序
    pub fn injected_members(&self) -> Vec<&InjectionSite> {
        let mut members: Vec<&InjectionSite> = self.members.iter().collect();
        members.sort_by_key(|site| (site.ordinal.is_none(), site.ordinal));
        members
    }
}
