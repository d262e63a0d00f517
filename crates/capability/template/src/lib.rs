//! 载荷模板解析（纯函数，无共享状态）。
//!
//! 支持的占位符：
//!
//! | 占位符 | 含义 |
//! |---|---|
//! | `${value}` | 当前点位值 |
//! | `${timestamp}` | 读取时间戳（毫秒） |
//! | `${quality}` | 读取质量 |
//! | `${tagName}` / `${tagId}` | 当前点位名称 / ID |
//! | `${connectionId}` | 源连接 ID |
//! | `${unit}` | 点位单位 |
//! | `${tags.<名称>.value}` / `${tags.<名称>.quality}` | 同批次其他点位 |
//!
//! 无法解析的占位符原样保留；以 `{` 或 `[` 开头的载荷解析后必须是合法 JSON。

use domain::{Quality, TagValue};
use std::collections::BTreeMap;

/// 模板解析错误。
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TemplateError {
    #[error("payload is not valid json after resolution: {0}")]
    InvalidJson(String),
    #[error("topic is empty after resolution")]
    EmptyTopic,
    #[error("topic contains wildcard: {0}")]
    WildcardTopic(String),
}

impl TemplateError {
    pub fn kind(&self) -> domain::ErrorKind {
        domain::ErrorKind::TemplateResolution
    }
}

/// 同批次点位快照（用于跨点位引用）。
#[derive(Debug, Clone, PartialEq)]
pub struct TagSnapshot {
    pub value: TagValue,
    pub quality: Quality,
}

/// 模板上下文。
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    pub value: TagValue,
    pub timestamp: i64,
    pub quality: Quality,
    pub tag_id: String,
    pub tag_name: String,
    pub connection_id: String,
    pub unit: Option<String>,
    /// 点位名称 → 快照
    pub tags: BTreeMap<String, TagSnapshot>,
}

impl TemplateContext {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "value" => Some(self.value.to_string()),
            "timestamp" => Some(self.timestamp.to_string()),
            "quality" => Some(self.quality.to_string()),
            "tagId" => Some(self.tag_id.clone()),
            "tagName" => Some(self.tag_name.clone()),
            "connectionId" => Some(self.connection_id.clone()),
            "unit" => self.unit.clone(),
            _ => {
                let path = key.strip_prefix("tags.")?;
                let (name, field) = path.rsplit_once('.')?;
                let snapshot = self.tags.get(name)?;
                match field {
                    "value" => Some(snapshot.value.to_string()),
                    "quality" => Some(snapshot.quality.to_string()),
                    _ => None,
                }
            }
        }
    }
}

/// 替换模板中的占位符，未知占位符原样保留。
pub fn resolve(template: &str, context: &TemplateContext) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // 未闭合，剩余部分原样输出
            output.push_str(&rest[start..]);
            return output;
        };
        let key = after[..end].trim();
        match context.lookup(key) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    output
}

/// 载荷看起来是 JSON（以 `{` 或 `[` 开头）。
pub fn looks_like_json(payload: &str) -> bool {
    matches!(payload.trim_start().chars().next(), Some('{') | Some('['))
}

/// 解析载荷模板；JSON 形态的载荷必须能解析为合法 JSON。
pub fn resolve_payload(template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let payload = resolve(template, context);
    if looks_like_json(&payload) {
        serde_json::from_str::<serde_json::Value>(&payload)
            .map_err(|err| TemplateError::InvalidJson(err.to_string()))?;
    }
    Ok(payload)
}

/// 解析 topic 模板。发布 topic 不允许为空或包含通配符。
pub fn resolve_topic(template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let topic = resolve(template, context);
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(TemplateError::EmptyTopic);
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(TemplateError::WildcardTopic(topic.to_string()));
    }
    Ok(topic.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unterminated_placeholder_is_kept() {
        let context = TemplateContext {
            value: TagValue::Number(1.0),
            timestamp: 0,
            quality: Quality::Good,
            tag_id: "t".to_string(),
            tag_name: "T".to_string(),
            connection_id: "c".to_string(),
            unit: None,
            tags: BTreeMap::new(),
        };
        assert_eq!(resolve("a-${value", &context), "a-${value");
        assert_eq!(resolve("${ value }/${unit}", &context), "1/${unit}");
    }
}
