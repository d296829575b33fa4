//! 绑定标签
//!
//! 标签是区分同一契约多个绑定的次级键。文本表示法：
//!
//! - 整数 → [`TagValue::Int`]
//! - `"typeof:T"` → [`TagValue::Type`]
//! - `"*"` → [`Tag::Any`]，`"Unique"` → [`Tag::Unique`]，`"Type"` → [`Tag::Type`]
//! - `"on:App.Consumer.ctor:dep,App.Other.*"` → [`Tag::On`]
//! - 其他字符串 → [`TagValue::Str`]

use crate::errors::{TypeParseError, TypeParseResult};
use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 具体标签值
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "TagRepr", into = "TagRepr")]
pub enum TagValue {
    Str(String),
    Int(i64),
    Type(TypeRef),
}

/// 绑定上声明的标签
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TagRepr", into = "TagRepr")]
pub enum Tag {
    /// 具体值，精确匹配
    Value(TagValue),
    /// 通配标签，匹配任意请求标签
    Any,
    /// 唯一标签，每个绑定获得互不相同的标签，集合中不会被合并
    Unique,
    /// 类型标签，请求标签等于实现类型时匹配
    Type,
    /// 位置规则，按注入点全路径匹配（支持末尾 `*`）
    On(Vec<String>),
}

/// 注册表中的标签键
///
/// 与 [`Tag`] 不同，`Unique` 在注册时被分配了序号
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagKey {
    None,
    Value(TagValue),
    Any,
    Type,
    On(Vec<String>),
    Unique(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TagRepr {
    Int(i64),
    Text(String),
}

impl TagValue {
    /// 字符串标签
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// 从文本表示法解析
    pub fn parse_text(text: &str) -> TypeParseResult<Self> {
        match text.strip_prefix("typeof:") {
            Some(ty) => Ok(Self::Type(ty.parse()?)),
            None => Ok(Self::Str(text.to_string())),
        }
    }
}

impl Tag {
    /// 字符串标签
    pub fn str(value: impl Into<String>) -> Self {
        Self::Value(TagValue::Str(value.into()))
    }

    /// 整数标签
    pub fn int(value: i64) -> Self {
        Self::Value(TagValue::Int(value))
    }

    /// 位置规则标签
    pub fn on<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::On(patterns.into_iter().map(Into::into).collect())
    }

    /// 从文本表示法解析
    pub fn parse_text(text: &str) -> TypeParseResult<Self> {
        match text {
            "*" => Ok(Self::Any),
            "Unique" => Ok(Self::Unique),
            "Type" => Ok(Self::Type),
            _ => match text.strip_prefix("on:") {
                Some(rest) => {
                    let patterns: Vec<String> = rest
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                    if patterns.is_empty() {
                        return Err(TypeParseError::InvalidTag {
                            text: text.to_string(),
                        });
                    }
                    Ok(Self::On(patterns))
                }
                None => Ok(Self::Value(TagValue::parse_text(text)?)),
            },
        }
    }
}

impl TagKey {
    /// 具体标签值（若有）
    pub fn value(&self) -> Option<&TagValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// 位置规则匹配，模式末尾的 `*` 匹配任意后缀
pub fn tag_on_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => write!(f, "\"{value}\""),
            Self::Int(value) => write!(f, "{value}"),
            Self::Type(ty) => write!(f, "typeof({ty})"),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Any => f.write_str("*"),
            Self::Unique => f.write_str("Unique"),
            Self::Type => f.write_str("Type"),
            Self::On(patterns) => write!(f, "on({})", patterns.join(", ")),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("<none>"),
            Self::Value(value) => write!(f, "{value}"),
            Self::Any => f.write_str("*"),
            Self::Type => f.write_str("Type"),
            Self::On(patterns) => write!(f, "on({})", patterns.join(", ")),
            Self::Unique(index) => write!(f, "Unique#{index}"),
        }
    }
}

impl From<&Option<Tag>> for TagKey {
    fn from(tag: &Option<Tag>) -> Self {
        match tag {
            None => Self::None,
            Some(Tag::Value(value)) => Self::Value(value.clone()),
            Some(Tag::Any) => Self::Any,
            Some(Tag::Type) => Self::Type,
            Some(Tag::On(patterns)) => Self::On(patterns.clone()),
            // 序号由注册表分配
            Some(Tag::Unique) => Self::Unique(0),
        }
    }
}

impl TryFrom<TagRepr> for TagValue {
    type Error = TypeParseError;

    fn try_from(repr: TagRepr) -> Result<Self, Self::Error> {
        match repr {
            TagRepr::Int(value) => Ok(Self::Int(value)),
            TagRepr::Text(text) => Self::parse_text(&text),
        }
    }
}

impl From<TagValue> for TagRepr {
    fn from(value: TagValue) -> Self {
        match value {
            TagValue::Int(value) => Self::Int(value),
            TagValue::Str(text) => Self::Text(text),
            TagValue::Type(ty) => Self::Text(format!("typeof:{ty}")),
        }
    }
}

impl TryFrom<TagRepr> for Tag {
    type Error = TypeParseError;

    fn try_from(repr: TagRepr) -> Result<Self, Self::Error> {
        match repr {
            TagRepr::Int(value) => Ok(Self::int(value)),
            TagRepr::Text(text) => Self::parse_text(&text),
        }
    }
}

impl From<Tag> for TagRepr {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::Value(value) => value.into(),
            Tag::Any => Self::Text("*".to_string()),
            Tag::Unique => Self::Text("Unique".to_string()),
            Tag::Type => Self::Text("Type".to_string()),
            Tag::On(patterns) => Self::Text(format!("on:{}", patterns.join(","))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_keywords_and_rules() {
        assert_eq!(Tag::parse_text("*").unwrap(), Tag::Any);
        assert_eq!(Tag::parse_text("Unique").unwrap(), Tag::Unique);
        assert_eq!(
            Tag::parse_text("on:App.Consumer.ctor:dep, App.Other.*").unwrap(),
            Tag::on(["App.Consumer.ctor:dep", "App.Other.*"])
        );
        assert_eq!(
            Tag::parse_text("typeof:Mailer").unwrap(),
            Tag::Value(TagValue::Type(TypeRef::named("Mailer")))
        );
        assert!(Tag::parse_text("on:").is_err());
    }

    #[test]
    fn deserializes_integer_and_text_tags() {
        let tags: Vec<Tag> = serde_json::from_str(r#"[1, "fast", "Unique"]"#).unwrap();
        assert_eq!(tags, vec![Tag::int(1), Tag::str("fast"), Tag::Unique]);
    }

    #[test]
    fn tag_on_supports_trailing_wildcard() {
        assert!(tag_on_matches("App.Consumer.*", "App.Consumer.ctor:dep"));
        assert!(tag_on_matches("App.Consumer.ctor:dep", "App.Consumer.ctor:dep"));
        assert!(!tag_on_matches("App.Consumer.ctor:dep", "App.Consumer.ctor:other"));
        assert!(!tag_on_matches("App.Other*", "App.Consumer.ctor:dep"));
    }
}
