//! 高度测量
//!
//! 实际渲染高度由宿主提供；宿主暂时无法测量时按块类型的行高倍数估算。

use std::cell::Cell;
use tracing::debug;

use crate::layout::config::FittingConfig;
use crate::layout::segment::{ContentSegment, SegmentType};

/// 宿主提供的测量能力
pub trait MeasurementProvider {
    /// 返回片段在目标环境中的渲染高度（像素），无法测量时返回`None`
    fn measure(&self, html: &str, config: &FittingConfig) -> Option<f32>;
}

impl<F> MeasurementProvider for F
where
    F: Fn(&str, &FittingConfig) -> Option<f32>,
{
    fn measure(&self, html: &str, config: &FittingConfig) -> Option<f32> {
        self(html, config)
    }
}

/// 块类型对应的行高倍数
pub fn line_multiplier(segment_type: SegmentType, heading_level: Option<u8>) -> f32 {
    match segment_type {
        SegmentType::Heading => match heading_level.unwrap_or(1) {
            1 => 2.0,
            2 => 1.7,
            3 => 1.5,
            4 => 1.3,
            _ => 1.15,
        },
        SegmentType::Paragraph | SegmentType::List | SegmentType::ListItem => 1.0,
        SegmentType::Blockquote => 1.1,
        SegmentType::Code => 0.95,
        SegmentType::Table => 1.3,
        SegmentType::Image | SegmentType::Figure | SegmentType::Rule => 1.0,
    }
}

/// 按字符数和类型估算单个块的高度
pub fn estimate_segment_height(segment: &ContentSegment, config: &FittingConfig) -> f32 {
    let line_px = config.line_height_px();
    let multiplier = line_multiplier(segment.segment_type, segment.heading_level);
    let chars_per_line = config.chars_per_line();

    let lines = match segment.segment_type {
        SegmentType::Rule => 1.0,
        SegmentType::Image => config.image_height_lines,
        SegmentType::Figure => config.image_height_lines + wrapped_lines(&segment.text_content, chars_per_line, 0) as f32,
        SegmentType::Code => segment
            .text_content
            .lines()
            .map(|line| wrapped_lines(line, chars_per_line, 1))
            .sum::<usize>()
            .max(1) as f32,
        SegmentType::List => {
            let items = segment.html_content.matches("<li").count();
            wrapped_lines(&segment.text_content, chars_per_line, 1).max(items) as f32
        }
        SegmentType::Table => {
            let rows = segment.html_content.matches("<tr").count();
            wrapped_lines(&segment.text_content, chars_per_line, 1).max(rows) as f32
        }
        _ => {
            let breaks = segment.html_content.matches("<br").count();
            (wrapped_lines(&segment.text_content, chars_per_line, 1) + breaks) as f32
        }
    };

    lines * line_px * multiplier / config.columns() as f32 + config.paragraph_spacing
}

fn wrapped_lines(text: &str, chars_per_line: usize, minimum: usize) -> usize {
    let chars = text.chars().count();
    chars.div_ceil(chars_per_line).max(minimum)
}

/// 测量器：优先使用宿主测量，不可用时退回估算
pub struct Measurer<'a> {
    provider: Option<&'a dyn MeasurementProvider>,
    config: &'a FittingConfig,
    fallback_logged: Cell<bool>,
}

impl<'a> Measurer<'a> {
    pub fn new(provider: Option<&'a dyn MeasurementProvider>, config: &'a FittingConfig) -> Self {
        Self {
            provider,
            config,
            fallback_logged: Cell::new(false),
        }
    }

    pub fn config(&self) -> &FittingConfig {
        self.config
    }

    /// 测量若干块组合在一起的高度
    pub fn measure(&self, segments: &[&ContentSegment]) -> f32 {
        if segments.is_empty() {
            return 0.0;
        }
        if let Some(provider) = self.provider {
            let html = join_html(segments.iter().copied());
            match provider.measure(&html, self.config) {
                Some(height) if height.is_finite() && height >= 0.0 => return height,
                _ => {
                    if !self.fallback_logged.replace(true) {
                        debug!("测量不可用，使用启发式估算");
                    }
                }
            }
        }
        segments
            .iter()
            .map(|segment| estimate_segment_height(segment, self.config))
            .sum()
    }

    pub fn measure_one(&self, segment: &ContentSegment) -> f32 {
        self.measure(&[segment])
    }
}

/// 页面内容的拼接方式
pub fn join_html<'s>(segments: impl IntoIterator<Item = &'s ContentSegment>) -> String {
    segments
        .into_iter()
        .map(|segment| segment.html_content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(segment_type: SegmentType, html: &str, text: &str) -> ContentSegment {
        ContentSegment::new("s".to_string(), segment_type, html.to_string(), text.to_string())
    }

    #[test]
    fn test_heuristic_paragraph_height() {
        let config = FittingConfig::default();
        // 65字符/行，24px行高，8px段间距
        let short = segment(SegmentType::Paragraph, "<p>hi</p>", "hi");
        assert_eq!(estimate_segment_height(&short, &config), 32.0);

        let long_text = "x".repeat(130);
        let long = segment(SegmentType::Paragraph, "<p>..</p>", &long_text);
        assert_eq!(estimate_segment_height(&long, &config), 56.0);

        let poem = segment(SegmentType::Blockquote, "<blockquote>a<br>b<br>c</blockquote>", "a b c");
        assert_eq!(estimate_segment_height(&poem, &config), 3.0 * 24.0 * 1.1 + 8.0);
    }

    #[test]
    fn test_heuristic_type_table() {
        let config = FittingConfig::default();
        let heading = ContentSegment {
            heading_level: Some(1),
            ..segment(SegmentType::Heading, "<h1>T</h1>", "T")
        };
        assert_eq!(estimate_segment_height(&heading, &config), 24.0 * 2.0 + 8.0);

        let image = segment(SegmentType::Image, "<img src=\"x\">", "");
        assert_eq!(estimate_segment_height(&image, &config), 12.0 * 24.0 + 8.0);

        let list = segment(SegmentType::List, "<ul><li>a</li><li>b</li><li>c</li></ul>", "a b c");
        assert_eq!(estimate_segment_height(&list, &config), 3.0 * 24.0 + 8.0);
    }

    #[test]
    fn test_provider_is_preferred() {
        let config = FittingConfig::default();
        let provider = |html: &str, _: &FittingConfig| Some(html.len() as f32);
        let measurer = Measurer::new(Some(&provider), &config);
        let a = segment(SegmentType::Paragraph, "<p>a</p>", "a");
        let b = segment(SegmentType::Paragraph, "<p>b</p>", "b");
        assert_eq!(measurer.measure(&[&a, &b]), "<p>a</p>\n<p>b</p>".len() as f32);
    }

    #[test]
    fn test_unavailable_provider_falls_back() {
        let config = FittingConfig::default();
        let provider = |_: &str, _: &FittingConfig| -> Option<f32> { None };
        let measurer = Measurer::new(Some(&provider), &config);
        let a = segment(SegmentType::Paragraph, "<p>a</p>", "a");
        assert_eq!(measurer.measure_one(&a), estimate_segment_height(&a, &config));

        let broken = |_: &str, _: &FittingConfig| -> Option<f32> { Some(f32::NAN) };
        let measurer = Measurer::new(Some(&broken), &config);
        assert_eq!(measurer.measure_one(&a), 32.0);
    }
}
