//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）的结构定义。

use crate::epub::opf::manifest::Manifest;

/// 包文档中声明的原始itemref
#[derive(Debug, Clone)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读
    pub linear: bool,
}

impl SpineItem {
    /// 创建新的脊柱项
    pub fn new(idref: String) -> Self {
        Self {
            idref,
            linear: true,
        }
    }
}

/// 解析后的阅读顺序项
#[derive(Debug, Clone, PartialEq)]
pub struct SpineEntry {
    /// 清单项ID
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 阅读顺序(从0开始，连续)
    pub order: usize,
    /// 是否线性阅读
    pub linear: bool,
}

/// 阅读顺序，由清单与itemref列表一次性推导，之后只读
#[derive(Debug, Clone, Default)]
pub struct Spine {
    entries: Vec<SpineEntry>,
}

impl Spine {
    /// 根据清单解析itemref
    ///
    /// idref在清单中找不到的项会被静默丢弃（对不规范文件的宽容策略），
    /// 剩余项的`order`重新从0连续编号。
    pub fn resolve(items: &[SpineItem], manifest: &Manifest) -> Self {
        let entries = items
            .iter()
            .filter_map(|item| manifest.get(&item.idref).map(|m| (item, m)))
            .enumerate()
            .map(|(order, (item, manifest_item))| SpineEntry {
                id: manifest_item.id.clone(),
                href: manifest_item.href.clone(),
                order,
                linear: item.linear,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SpineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 根据href查找阅读顺序位置
    pub fn position_of(&self, href: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.href == href)
    }
}
