//! 类型描述
//!
//! 以结构化方式表示契约类型与实现类型，并提供文本表示法的解析。
//!
//! 文本表示法示例：`IRepository<TT>`、`Func<IService>`、`Owned<Worker>`、
//! `List<IPlugin>`、`IPlugin[]`、`(IClock, ILogger)`。
//! 形如 `TT`、`TT1`、`TT2` 的标识符是泛型标记，在合一时代表任意类型。

use crate::errors::{TypeParseError, TypeParseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 集合种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionKind {
    /// 数组，立即物化
    Array,
    /// 列表，立即物化
    List,
    /// 集合，立即物化
    Set,
    /// 队列，立即物化
    Queue,
    /// 栈，立即物化
    Stack,
    /// 惰性迭代序列，首次迭代时物化一次并缓存
    Enumerable,
}

impl CollectionKind {
    /// 所有集合种类
    pub const ALL: [Self; 6] = [
        Self::Array,
        Self::List,
        Self::Set,
        Self::Queue,
        Self::Stack,
        Self::Enumerable,
    ];

    /// 集合种类在文本表示法中的名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Array => "Array",
            Self::List => "List",
            Self::Set => "Set",
            Self::Queue => "Queue",
            Self::Stack => "Stack",
            Self::Enumerable => "Enumerable",
        }
    }

    /// 根据名称查找集合种类
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// 是否为惰性迭代
    pub fn is_lazy(self) -> bool {
        matches!(self, Self::Enumerable)
    }
}

/// 结构化类型描述
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// 具名类型，可带泛型参数
    Named { path: String, args: Vec<TypeRef> },
    /// 泛型标记
    Marker(String),
    /// 定长元组
    Tuple(Vec<TypeRef>),
    /// 工厂函数，调用时才解析目标
    Func(Box<TypeRef>),
    /// 惰性值，首次访问时解析并缓存
    Lazy(Box<TypeRef>),
    /// 所有权包装，携带独立的释放跟踪器
    Owned(Box<TypeRef>),
    /// 集合
    Collection {
        kind: CollectionKind,
        element: Box<TypeRef>,
    },
}

/// 类型头部
///
/// 绑定注册表按头部建立索引，避免对每个绑定都做完整合一
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHead {
    Named { path: String, arity: usize },
    Tuple(usize),
    Func,
    Lazy,
    Owned,
    Collection(CollectionKind),
}

impl TypeRef {
    /// 创建无泛型参数的具名类型
    pub fn named(path: impl Into<String>) -> Self {
        Self::Named {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// 创建泛型具名类型
    pub fn generic(path: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Named {
            path: path.into(),
            args,
        }
    }

    /// 创建泛型标记
    pub fn marker(name: impl Into<String>) -> Self {
        Self::Marker(name.into())
    }

    /// 创建工厂函数类型
    pub fn func(target: TypeRef) -> Self {
        Self::Func(Box::new(target))
    }

    /// 创建惰性值类型
    pub fn lazy(target: TypeRef) -> Self {
        Self::Lazy(Box::new(target))
    }

    /// 创建所有权包装类型
    pub fn owned(target: TypeRef) -> Self {
        Self::Owned(Box::new(target))
    }

    /// 创建集合类型
    pub fn collection(kind: CollectionKind, element: TypeRef) -> Self {
        Self::Collection {
            kind,
            element: Box::new(element),
        }
    }

    /// 创建元组类型
    pub fn tuple(items: Vec<TypeRef>) -> Self {
        Self::Tuple(items)
    }

    /// 从文本表示法解析
    pub fn parse(text: &str) -> TypeParseResult<Self> {
        text.parse()
    }

    /// 标识符是否为泛型标记（`TT` 后跟可选数字）
    pub fn is_marker_name(name: &str) -> bool {
        name.strip_prefix("TT")
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    }

    /// 直接子类型
    pub fn children(&self) -> Vec<&TypeRef> {
        match self {
            Self::Named { args, .. } => args.iter().collect(),
            Self::Marker(_) => Vec::new(),
            Self::Tuple(items) => items.iter().collect(),
            Self::Func(inner) | Self::Lazy(inner) | Self::Owned(inner) => vec![inner.as_ref()],
            Self::Collection { element, .. } => vec![element.as_ref()],
        }
    }

    /// 是否包含泛型标记
    pub fn is_open(&self) -> bool {
        match self {
            Self::Marker(_) => true,
            other => other.children().into_iter().any(TypeRef::is_open),
        }
    }

    /// 收集出现的所有泛型标记
    pub fn markers(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.collect_markers(&mut found);
        found
    }

    fn collect_markers(&self, found: &mut BTreeSet<String>) {
        if let Self::Marker(name) = self {
            found.insert(name.clone());
        }
        for child in self.children() {
            child.collect_markers(found);
        }
    }

    /// 类型头部，泛型标记没有头部
    pub fn head(&self) -> Option<TypeHead> {
        match self {
            Self::Named { path, args } => Some(TypeHead::Named {
                path: path.clone(),
                arity: args.len(),
            }),
            Self::Marker(_) => None,
            Self::Tuple(items) => Some(TypeHead::Tuple(items.len())),
            Self::Func(_) => Some(TypeHead::Func),
            Self::Lazy(_) => Some(TypeHead::Lazy),
            Self::Owned(_) => Some(TypeHead::Owned),
            Self::Collection { kind, .. } => Some(TypeHead::Collection(*kind)),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> String {
        match self {
            Self::Named { path, args } if args.is_empty() => path
                .rsplit(['.', ':'])
                .next()
                .unwrap_or(path)
                .to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { path, args } => {
                f.write_str(path)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Marker(name) => f.write_str(name),
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Func(inner) => write!(f, "Func<{inner}>"),
            Self::Lazy(inner) => write!(f, "Lazy<{inner}>"),
            Self::Owned(inner) => write!(f, "Owned<{inner}>"),
            Self::Collection {
                kind: CollectionKind::Array,
                element,
            } => write!(f, "{element}[]"),
            Self::Collection { kind, element } => write!(f, "{}<{element}>", kind.name()),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser::new(text);
        parser.skip_ws();
        if parser.at_end() {
            return Err(TypeParseError::Empty);
        }
        let ty = parser.parse_type()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(ty),
            Some(found) => Err(parser.unexpected(found)),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// 文本表示法的递归下降解析器
struct TypeParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> TypeParseResult<()> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(found) => Err(self.unexpected(found)),
            None => Err(self.end()),
        }
    }

    fn unexpected(&self, found: char) -> TypeParseError {
        TypeParseError::UnexpectedChar {
            input: self.input.to_string(),
            position: self.pos,
            found,
        }
    }

    fn end(&self) -> TypeParseError {
        TypeParseError::UnexpectedEnd {
            input: self.input.to_string(),
        }
    }

    fn parse_type(&mut self) -> TypeParseResult<TypeRef> {
        let mut ty = if self.eat('(') {
            self.parse_tuple_rest()?
        } else {
            self.parse_named()?
        };
        while self.eat('[') {
            self.expect(']')?;
            ty = TypeRef::collection(CollectionKind::Array, ty);
        }
        Ok(ty)
    }

    fn parse_tuple_rest(&mut self) -> TypeParseResult<TypeRef> {
        if self.eat(')') {
            return Ok(TypeRef::Tuple(Vec::new()));
        }
        let mut items = vec![self.parse_type()?];
        let mut trailing_comma = false;
        loop {
            if self.eat(',') {
                if self.eat(')') {
                    trailing_comma = true;
                    break;
                }
                items.push(self.parse_type()?);
            } else {
                self.expect(')')?;
                break;
            }
        }
        if items.len() == 1 && !trailing_comma {
            // 单元素括号只用于分组
            return Ok(items.remove(0));
        }
        Ok(TypeRef::Tuple(items))
    }

    fn parse_named(&mut self) -> TypeParseResult<TypeRef> {
        let name = self.parse_ident()?;
        let mut args = Vec::new();
        if self.eat('<') {
            args.push(self.parse_type()?);
            while self.eat(',') {
                args.push(self.parse_type()?);
            }
            self.expect('>')?;
        }
        Self::build(name, args)
    }

    fn parse_ident(&mut self) -> TypeParseResult<String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':'))
        {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(found) => Err(self.unexpected(found)),
                None => Err(self.end()),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn build(name: String, mut args: Vec<TypeRef>) -> TypeParseResult<TypeRef> {
        if args.is_empty() {
            if TypeRef::is_marker_name(&name) {
                return Ok(TypeRef::Marker(name));
            }
            return Ok(TypeRef::named(name));
        }

        let wrapper = matches!(name.as_str(), "Func" | "Lazy" | "Owned");
        let collection = CollectionKind::from_name(&name);
        if !wrapper && collection.is_none() {
            return Ok(TypeRef::generic(name, args));
        }
        if args.len() != 1 {
            return Err(TypeParseError::Arity {
                name,
                expected: 1,
                found: args.len(),
            });
        }

        let inner = args.remove(0);
        Ok(match name.as_str() {
            "Func" => TypeRef::func(inner),
            "Lazy" => TypeRef::lazy(inner),
            "Owned" => TypeRef::owned(inner),
            _ => match collection {
                Some(kind) => TypeRef::collection(kind, inner),
                None => TypeRef::generic(name.clone(), vec![inner]),
            },
        })
    }
}
