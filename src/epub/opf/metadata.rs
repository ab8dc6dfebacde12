//! 元数据处理模块
//!
//! 解析过程中先把Dublin Core元素与meta标签原样收集起来，解析结束后再
//! 整理为只读的[`BookMetadata`]。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 元数据值枚举，表示不同来源的元数据
#[derive(Debug, Clone)]
pub enum MetadataValue {
    /// Dublin Core元素
    DublinCore {
        /// 元素内容
        value: String,
        /// 元素属性（如 role, file-as, scheme等）
        attributes: HashMap<String, String>,
    },
    /// `<meta name=".." content=".."/>` 或 `<meta property="..">..</meta>`
    Meta { content: String },
}

impl MetadataValue {
    fn content(&self) -> &str {
        match self {
            MetadataValue::DublinCore { value, .. } => value,
            MetadataValue::Meta { content } => content,
        }
    }
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    /// 创建者姓名
    pub name: String,
    /// 角色(如author、editor等)
    pub role: Option<String>,
    /// 排序用名称
    pub file_as: Option<String>,
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    /// 标识符值
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    /// 元素ID
    pub id: Option<String>,
}

/// 书籍顶层元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: Option<String>,
    pub authors: Vec<Creator>,
    pub identifiers: Vec<Identifier>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    /// 封面图片路径(相对于OPF文件)
    pub cover_href: Option<String>,
}

impl BookMetadata {
    /// 作者姓名列表
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|c| c.name.as_str()).collect()
    }
}

/// 解析过程中收集的原始元数据
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// key为去掉命名空间前缀的标签名或meta的name/property
    raw_metadata: HashMap<String, Vec<MetadataValue>>,
    /// key为被精化的元素ID，value为(property, 内容)
    refines_metadata: HashMap<String, Vec<(String, String)>>,
}

impl Metadata {
    /// 创建新的元数据实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元数据
    pub fn add_dublin_core(&mut self, tag: String, value: String, attributes: HashMap<String, String>) {
        self.raw_metadata
            .entry(tag)
            .or_default()
            .push(MetadataValue::DublinCore { value, attributes });
    }

    /// 添加基于name或property的meta元数据
    pub fn add_meta(&mut self, key: String, content: String) {
        self.raw_metadata
            .entry(key)
            .or_default()
            .push(MetadataValue::Meta { content });
    }

    /// 添加基于refines的meta元数据
    pub fn add_refines(&mut self, refines_id: String, property: String, content: String) {
        let refines_id = refines_id.trim_start_matches('#').to_string();
        self.refines_metadata
            .entry(refines_id)
            .or_default()
            .push((property, content));
    }

    fn first(&self, tag: &str) -> Option<String> {
        self.raw_metadata
            .get(tag)
            .and_then(|values| values.first())
            .map(|v| v.content().trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 获取标题
    pub fn title(&self) -> Option<String> {
        self.first("title")
    }

    /// 获取语言
    pub fn language(&self) -> Option<String> {
        self.first("language")
    }

    /// 获取出版社
    pub fn publisher(&self) -> Option<String> {
        self.first("publisher")
    }

    /// 获取描述
    pub fn description(&self) -> Option<String> {
        self.first("description")
    }

    /// `<meta name="cover" content="..."/>`中的值（通常是清单ID）
    pub fn cover(&self) -> Option<String> {
        self.first("cover")
    }

    /// 获取所有创建者（支持EPUB3的refines关联）
    pub fn creators(&self) -> Vec<Creator> {
        let Some(values) = self.raw_metadata.get("creator") else {
            return Vec::new();
        };

        values
            .iter()
            .filter_map(|value| match value {
                MetadataValue::DublinCore { value, attributes } => {
                    let mut creator = Creator {
                        name: value.trim().to_string(),
                        role: attributes.get("role").map(|r| relator_name(r)),
                        file_as: attributes.get("file-as").cloned(),
                    };
                    if let Some(refines) = attributes.get("id").and_then(|id| self.refines_metadata.get(id)) {
                        for (property, content) in refines {
                            match property.as_str() {
                                "role" => creator.role = Some(relator_name(content)),
                                "file-as" => creator.file_as = Some(content.clone()),
                                _ => {}
                            }
                        }
                    }
                    Some(creator)
                }
                MetadataValue::Meta { .. } => None,
            })
            .filter(|creator| !creator.name.is_empty())
            .collect()
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        let Some(values) = self.raw_metadata.get("identifier") else {
            return Vec::new();
        };

        values
            .iter()
            .filter_map(|value| match value {
                MetadataValue::DublinCore { value, attributes } => Some(Identifier {
                    value: value.trim().to_string(),
                    scheme: attributes.get("scheme").cloned(),
                    id: attributes.get("id").cloned(),
                }),
                MetadataValue::Meta { .. } => None,
            })
            .filter(|identifier| !identifier.value.is_empty())
            .collect()
    }
}

/// marc:relators角色代码转换为可读名称
fn relator_name(code: &str) -> String {
    match code {
        "aut" => "author".to_string(),
        "edt" => "editor".to_string(),
        "trl" => "translator".to_string(),
        "ill" => "illustrator".to_string(),
        other => other.to_string(),
    }
}
