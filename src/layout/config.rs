//! 排版配置模块
//!
//! 提供分页所需的排版参数，支持从YAML文件加载与生成。配置是只读的，
//! 任何修改都意味着之前的分页结果失效，需要整体重新计算。

use crate::epub::error::{EpubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "pageforge.yaml";

/// 单页内容高度的安全系数
pub const SAFETY_MARGIN: f32 = 0.95;

/// 拆分引用块时每段的行数
pub const BLOCKQUOTE_CHUNK_LINES: usize = 5;

/// 排版模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    #[default]
    Single,
    TwoColumn,
}

/// 页面内边距（像素）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Padding {
    fn default() -> Self {
        Self::uniform(40.0)
    }
}

impl Padding {
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// 分页配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    /// 容器宽度（像素）
    pub container_width: f32,
    /// 容器高度（像素）
    pub container_height: f32,
    pub padding: Padding,
    /// 字号（像素）
    pub font_size: f32,
    /// 行高倍数
    pub line_height: f32,
    /// 平均字宽与字号之比
    pub glyph_width_ratio: f32,
    /// 正文最大宽度（像素）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f32>,
    pub layout_mode: LayoutMode,
    /// 双栏间距（像素）
    pub column_gap: f32,
    /// 块之间的间距（像素）
    pub paragraph_spacing: f32,
    /// 图片按多少行估算
    pub image_height_lines: f32,
    pub font_family: String,
}

/// 与宿主接口保持一致的别名
pub type PaginationConfig = FittingConfig;

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            container_width: 600.0,
            container_height: 800.0,
            padding: Padding::default(),
            font_size: 16.0,
            line_height: 1.5,
            glyph_width_ratio: 0.5,
            max_width: None,
            layout_mode: LayoutMode::Single,
            column_gap: 40.0,
            paragraph_spacing: 8.0,
            image_height_lines: 12.0,
            font_family: "serif".to_string(),
        }
    }
}

impl FittingConfig {
    /// 指定容器尺寸，其余取默认值
    pub fn with_dimensions(width: f32, height: f32) -> Self {
        Self {
            container_width: width,
            container_height: height,
            ..Self::default()
        }
    }

    /// 从YAML文本解析配置，缺省字段取默认值
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use pageforge::FittingConfig;
    /// let config = FittingConfig::from_file("pageforge.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;
        Self::from_yaml_str(&content)
    }

    /// 序列化为YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))
    }

    /// 把默认配置写入`path`
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = Self::default().to_yaml()?;

        // 在YAML内容前添加注释说明
        let content_with_header = format!(
            "# 分页配置文件\n# 尺寸单位均为像素，line_height为行高倍数\n# layout_mode: single | two-column\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))
    }

    /// 尝试从文件加载，文件不存在或无效时返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "使用默认分页配置");
                Self::default()
            }
        }
    }

    /// 检查尺寸参数
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("container_width", self.container_width),
            ("container_height", self.container_height),
            ("font_size", self.font_size),
            ("line_height", self.line_height),
            ("glyph_width_ratio", self.glyph_width_ratio),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EpubError::ConfigError(format!("{} 必须为正数，当前为 {}", name, value)));
            }
        }
        let padding = self.padding;
        if [padding.top, padding.right, padding.bottom, padding.left]
            .iter()
            .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(EpubError::ConfigError("内边距不能为负数".to_string()));
        }
        Ok(())
    }

    /// 单行高度（像素）
    pub fn line_height_px(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// 可用内容高度：容器高度减去上下内边距，至少一行
    pub fn available_height(&self) -> f32 {
        (self.container_height - self.padding.top - self.padding.bottom).max(self.line_height_px())
    }

    pub fn columns(&self) -> usize {
        match self.layout_mode {
            LayoutMode::Single => 1,
            LayoutMode::TwoColumn => 2,
        }
    }

    /// 单栏内容宽度
    pub fn content_width(&self) -> f32 {
        let mut width = self.container_width - self.padding.left - self.padding.right;
        if let Some(max_width) = self.max_width {
            width = width.min(max_width);
        }
        if self.layout_mode == LayoutMode::TwoColumn {
            width = (width - self.column_gap) / 2.0;
        }
        width.max(self.glyph_width())
    }

    /// 平均字宽（像素）
    pub fn glyph_width(&self) -> f32 {
        self.font_size * self.glyph_width_ratio
    }

    /// 每行大约容纳的字符数
    pub fn chars_per_line(&self) -> usize {
        ((self.content_width() / self.glyph_width()).floor() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_dimensions() {
        let config = FittingConfig::default();
        assert_eq!(config.line_height_px(), 24.0);
        assert_eq!(config.available_height(), 720.0);
        assert_eq!(config.content_width(), 520.0);
        assert_eq!(config.chars_per_line(), 65);
    }

    #[test]
    fn test_two_column_and_max_width() {
        let config = FittingConfig {
            layout_mode: LayoutMode::TwoColumn,
            max_width: Some(440.0),
            ..FittingConfig::default()
        };
        assert_eq!(config.columns(), 2);
        assert_eq!(config.content_width(), 200.0);
    }

    #[test]
    fn test_available_height_is_at_least_one_line() {
        let config = FittingConfig {
            container_height: 50.0,
            ..FittingConfig::default()
        };
        assert_eq!(config.available_height(), 24.0);
    }

    #[test]
    fn test_yaml_partial_and_roundtrip() {
        let config = FittingConfig::from_yaml_str("container_width: 320\ncontainer_height: 480\nlayout_mode: two-column\npadding:\n  top: 10\n").unwrap();
        assert_eq!(config.container_width, 320.0);
        assert_eq!(config.layout_mode, LayoutMode::TwoColumn);
        assert_eq!(config.padding.top, 10.0);
        assert_eq!(config.padding.bottom, 40.0);
        assert_eq!(config.font_size, 16.0);

        let yaml = config.to_yaml().unwrap();
        assert_eq!(FittingConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            FittingConfig::from_yaml_str("font_size: 0"),
            Err(EpubError::ConfigError(_))
        ));
        assert!(matches!(
            FittingConfig::from_yaml_str("container_width: [1, 2]"),
            Err(EpubError::ConfigError(_))
        ));
    }

    #[test]
    fn test_generate_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        FittingConfig::generate_default_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# 分页配置文件"));
        assert_eq!(FittingConfig::from_file(&path).unwrap(), FittingConfig::default());
        assert_eq!(
            FittingConfig::load_or_default(dir.path().join("missing.yaml")),
            FittingConfig::default()
        );
    }
}
