//! 清单模块
//!
//! 提供EPUB包中资源清单的结构定义。清单在包文档解析完成后一次性构建，
//! 之后只读。

use std::collections::HashMap;

/// 旧版导航控制文件(NCX)的媒体类型
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// 清单项信息
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    pub properties: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: String, href: String, media_type: String) -> Self {
        Self {
            id,
            href,
            media_type,
            properties: None,
        }
    }

    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        if let Some(properties) = &self.properties {
            properties.split_whitespace().any(|p| p == property)
        } else {
            false
        }
    }

    /// 检查是否为导航文档
    pub fn is_nav(&self) -> bool {
        self.has_property("nav")
    }

    /// 检查是否为NCX导航控制文件
    pub fn is_ncx(&self) -> bool {
        self.media_type == NCX_MEDIA_TYPE
    }

    /// 检查是否为封面图片
    pub fn is_cover_image(&self) -> bool {
        self.has_property("cover-image")
    }

    /// 检查是否为图片文件
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// 资源清单：ID → 清单项
///
/// 保留声明顺序，查找导航文档等"第一个满足条件的项"时结果是确定的。
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// 由清单项列表构建，重复ID以先出现者为准
    pub fn from_items(items: Vec<ManifestItem>) -> Self {
        let mut kept = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            if index.contains_key(&item.id) {
                continue;
            }
            index.insert(item.id.clone(), kept.len());
            kept.push(item);
        }
        Self { items: kept, index }
    }

    /// 根据ID获取清单项
    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 导航文档(EPUB3 nav)
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.is_nav())
    }

    /// 第一个NCX导航控制文件
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.is_ncx())
    }

    /// 带有cover-image属性的清单项
    pub fn cover_image_item(&self) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.is_cover_image())
    }
}
