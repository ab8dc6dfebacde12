//! 分页适配器
//!
//! 按顺序把块贪心地装入页面：
//! 1. 单个块超过安全高度且当前页为空时尝试结构拆分，拆不开就单独成页并标记溢出
//! 2. 追加后超过安全高度时先输出当前页，再用新页重试该块
//! 3. 标记了`keep_with_next`的块（标题）与下一块合计超过可用高度时，
//!    把标题移到下一页开头
//!
//! 每个章节独立分页，页面不跨章节。

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::epub::book::{BookContent, Chapter, Reference};
use crate::layout::config::{FittingConfig, SAFETY_MARGIN};
use crate::layout::measure::{MeasurementProvider, Measurer, join_html};
use crate::layout::page::{FittedContent, FittedPage, references_on_page};
use crate::layout::progress::{ProgressCallback, ProgressPhase, ProgressReporter};
use crate::layout::segment::{ContentSegment, ContentSegmenter};
use crate::layout::split;

/// 带有独立测量高度的块
#[derive(Debug, Clone)]
pub struct MeasuredSegment {
    pub segment: ContentSegment,
    pub height: f32,
    /// 拆分出的部分不再拆分
    pub splittable: bool,
}

/// 尚未编号的页面
#[derive(Debug, Clone)]
struct PageDraft {
    segments: Vec<ContentSegment>,
    measured_height: f32,
    overflow: bool,
}

/// 分页适配器
pub struct PageFitter<'a> {
    measurer: Measurer<'a>,
    available_height: f32,
}

impl<'a> PageFitter<'a> {
    pub fn new(config: &'a FittingConfig, provider: Option<&'a dyn MeasurementProvider>) -> Self {
        Self {
            measurer: Measurer::new(provider, config),
            available_height: config.available_height(),
        }
    }

    pub fn available_height(&self) -> f32 {
        self.available_height
    }

    fn budget(&self) -> f32 {
        self.available_height * SAFETY_MARGIN
    }

    /// 测量每个块的独立高度
    pub fn measure_segments(&self, segments: Vec<ContentSegment>) -> Vec<MeasuredSegment> {
        segments
            .into_iter()
            .map(|segment| MeasuredSegment {
                height: self.measurer.measure_one(&segment),
                splittable: split::is_splittable(&segment),
                segment,
            })
            .collect()
    }

    /// 对一个章节的块分页，返回每页的块列表
    fn fit_segments(&self, segments: Vec<MeasuredSegment>) -> Vec<PageDraft> {
        let budget = self.budget();
        let mut pages = Vec::new();
        let mut current: Vec<ContentSegment> = Vec::new();
        let mut queue: VecDeque<MeasuredSegment> = segments.into();

        while let Some(item) = queue.pop_front() {
            if item.height > budget && current.is_empty() {
                if item.splittable {
                    if let Some(parts) = split::split_to_fit(&item.segment, budget, &self.measurer) {
                        debug!(segment_id = %item.segment.id, parts = parts.len(), "超高块已拆分");
                        for part in parts.into_iter().rev() {
                            queue.push_front(MeasuredSegment {
                                height: self.measurer.measure_one(&part),
                                splittable: false,
                                segment: part,
                            });
                        }
                        continue;
                    }
                }
                debug!(segment_id = %item.segment.id, height = item.height, budget, "块无法放入单页，标记溢出");
                pages.push(PageDraft {
                    segments: vec![item.segment],
                    measured_height: item.height,
                    overflow: true,
                });
                continue;
            }

            if !current.is_empty() && self.measure_with(&current, &item.segment) > budget {
                self.flush(&mut current, &mut pages);
                queue.push_front(item);
                continue;
            }

            let keep_with_next = item.segment.keep_with_next;
            current.push(item.segment);

            if keep_with_next && current.len() > 1 {
                if let Some(next) = queue.front() {
                    // 与下一块合计时使用不带安全系数的可用高度
                    if self.measure_with(&current, &next.segment) > self.available_height {
                        let heading = current.pop();
                        self.flush(&mut current, &mut pages);
                        current.extend(heading);
                    }
                }
            }
        }

        self.flush(&mut current, &mut pages);
        pages
    }

    fn measure_with(&self, current: &[ContentSegment], next: &ContentSegment) -> f32 {
        let candidate: Vec<&ContentSegment> = current.iter().chain(std::iter::once(next)).collect();
        self.measurer.measure(&candidate)
    }

    fn flush(&self, current: &mut Vec<ContentSegment>, pages: &mut Vec<PageDraft>) {
        if current.is_empty() {
            return;
        }
        let segments = std::mem::take(current);
        let refs: Vec<&ContentSegment> = segments.iter().collect();
        let measured_height = self.measurer.measure(&refs);
        pages.push(PageDraft {
            segments,
            measured_height,
            overflow: false,
        });
    }

    /// 对一个章节分页；空章节也会输出一页
    pub fn fit_chapter(&self, chapter: &Chapter, references: &[&Reference], segments: Vec<MeasuredSegment>) -> Vec<FittedPage> {
        let mut drafts = self.fit_segments(segments);
        if drafts.is_empty() {
            drafts.push(PageDraft {
                segments: Vec::new(),
                measured_height: 0.0,
                overflow: false,
            });
        }

        drafts
            .into_iter()
            .map(|draft| {
                let html_content = join_html(&draft.segments);
                FittedPage {
                    page_index: 0,
                    chapter_id: chapter.id.clone(),
                    chapter_title: chapter.title.clone(),
                    references: references_on_page(&html_content, references),
                    segments: draft.segments,
                    html_content,
                    measured_height: draft.measured_height,
                    available_height: self.available_height,
                    overflow: draft.overflow,
                }
            })
            .collect()
    }
}

/// 对整本书分页
///
/// 结果只由内容、配置和测量结果决定；配置或尺寸变化时需要整体重新调用。
/// `provider`为`None`或暂时无法测量时使用启发式估算。
pub fn fit_content(
    content: &BookContent,
    config: &FittingConfig,
    provider: Option<&dyn MeasurementProvider>,
    on_progress: Option<ProgressCallback<'_>>,
) -> FittedContent {
    let mut progress = ProgressReporter::new(on_progress);
    let fitter = PageFitter::new(config, provider);
    let total = content.chapters.len();

    let mut segmented = Vec::with_capacity(total);
    for (i, chapter) in content.chapters.iter().enumerate() {
        progress.report_step(ProgressPhase::Parsing, (0, 20), i, total, Some(&chapter.title));
        segmented.push(ContentSegmenter::segment_chapter(chapter));
    }

    let mut measured = Vec::with_capacity(total);
    for (i, (chapter, segments)) in content.chapters.iter().zip(segmented).enumerate() {
        progress.report_step(ProgressPhase::Measuring, (20, 50), i, total, Some(&chapter.title));
        measured.push(fitter.measure_segments(segments));
    }

    let mut pages = Vec::new();
    for (i, (chapter, segments)) in content.chapters.iter().zip(measured).enumerate() {
        progress.report_step(ProgressPhase::Fitting, (50, 100), i, total, Some(&chapter.title));
        let references = content.references_for(&chapter.id);
        pages.extend(fitter.fit_chapter(chapter, &references, segments));
    }

    for (index, page) in pages.iter_mut().enumerate() {
        page.page_index = index;
    }

    let overflow = pages.iter().filter(|page| page.overflow).count();
    info!(
        book_id = %content.book_id,
        chapters = total,
        pages = pages.len(),
        overflow,
        "分页完成"
    );
    progress.report(ProgressPhase::Complete, 100, None);

    FittedContent {
        total_pages: pages.len(),
        pages,
        fitting_config: config.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::segment::SegmentType;

    /// 每个块标记20像素
    fn line_counter(html: &str, _: &FittingConfig) -> Option<f32> {
        let lines = ["<br", "<p", "<blockquote", "<li", "<h", "<img"]
            .iter()
            .map(|marker| html.matches(marker).count())
            .sum::<usize>();
        Some(lines as f32 * 20.0)
    }

    /// 可用高度为`lines`行（20像素）
    fn config_for_lines(lines: f32) -> FittingConfig {
        FittingConfig {
            container_height: lines * 20.0,
            padding: crate::layout::config::Padding::uniform(0.0),
            font_size: 10.0,
            line_height: 1.0,
            ..FittingConfig::default()
        }
    }

    fn chapter(id: &str, html: &str) -> Chapter {
        Chapter {
            id: id.to_string(),
            title: format!("Title {}", id),
            html_content: html.to_string(),
            order: 0,
            href: format!("{}.xhtml", id),
        }
    }

    fn book(chapters: Vec<Chapter>) -> BookContent {
        BookContent {
            book_id: "b".to_string(),
            chapters,
            ..Default::default()
        }
    }

    fn paragraphs(n: usize) -> String {
        (1..=n).map(|i| format!("<p>P{}</p>", i)).collect()
    }

    #[test]
    fn test_paragraphs_fill_pages() {
        let config = config_for_lines(5.5);
        let fitted = fit_content(&book(vec![chapter("c1", &paragraphs(12))]), &config, Some(&line_counter), None);

        // 每页预算 110*0.95=104.5，可放5段
        assert_eq!(fitted.total_pages, 3);
        let counts: Vec<usize> = fitted.pages.iter().map(|p| p.segments.len()).collect();
        assert_eq!(counts, vec![5, 5, 2]);
        assert!(fitted.pages.iter().all(|p| !p.overflow));
        assert_eq!(fitted.pages[1].page_index, 1);
        assert_eq!(fitted.pages[0].available_height, 110.0);
        assert_eq!(fitted.pages[0].measured_height, 100.0);
    }

    #[test]
    fn test_oversized_table_overflows() {
        let config = config_for_lines(5.5);
        let html = format!("<p>before</p><table>{}</table><p>after</p>", "<tr><td><p>x</p></td></tr>".repeat(8));
        let fitted = fit_content(&book(vec![chapter("c1", &html)]), &config, Some(&line_counter), None);

        assert_eq!(fitted.total_pages, 3);
        assert!(!fitted.pages[0].overflow);
        assert!(fitted.pages[1].overflow);
        assert_eq!(fitted.pages[1].segments[0].segment_type, SegmentType::Table);
        assert!(!fitted.pages[2].overflow);
        assert_eq!(fitted.overflow_pages(), 1);
    }

    #[test]
    fn test_heading_moves_to_next_page() {
        let config = config_for_lines(5.5);
        let html = format!("{}<h2>Next section</h2><p>body</p>", paragraphs(4));
        let fitted = fit_content(&book(vec![chapter("c1", &html)]), &config, Some(&line_counter), None);

        assert_eq!(fitted.total_pages, 2);
        assert_eq!(fitted.pages[0].segments.len(), 4);
        assert_eq!(fitted.pages[1].segments[0].segment_type, SegmentType::Heading);
        assert_eq!(fitted.pages[1].segments.len(), 2);
    }

    #[test]
    fn test_blockquote_split_across_pages() {
        let config = config_for_lines(5.5);
        let lines = (1..=12).map(|i| format!("Line {}", i)).collect::<Vec<_>>().join("<br/>");
        let html = format!("<blockquote>{}</blockquote>", lines);
        let fitted = fit_content(&book(vec![chapter("c1", &html)]), &config, Some(&line_counter), None);

        assert!(fitted.total_pages >= 3);
        assert_eq!(fitted.pages[0].segments[0].segment_type, SegmentType::Blockquote);
        assert!(fitted.pages[1..]
            .iter()
            .flat_map(|p| &p.segments)
            .all(|s| s.segment_type == SegmentType::Paragraph));
        assert!(fitted.pages.iter().all(|p| p.chapter_id == "c1" && !p.overflow));
    }

    #[test]
    fn test_list_item_taller_than_page_overflows() {
        let config = config_for_lines(5.5);
        let html = "<ul><li>a</li><li>1<br/>2<br/>3<br/>4<br/>5<br/>6<br/>7</li></ul>";
        let fitted = fit_content(&book(vec![chapter("c1", html)]), &config, Some(&line_counter), None);

        // 整个列表160像素，拆成20和140两部分，合并后仍超出104.5
        assert_eq!(fitted.total_pages, 2);
        assert!(!fitted.pages[0].overflow);
        assert_eq!(fitted.pages[0].measured_height, 20.0);
        assert!(fitted.pages[0].html_content.contains("<li>a</li>"));

        assert!(fitted.pages[1].overflow);
        assert_eq!(fitted.pages[1].segments.len(), 1);
        assert_eq!(fitted.pages[1].segments[0].segment_type, SegmentType::List);
        assert_eq!(fitted.pages[1].measured_height, 140.0);
        assert!(fitted.pages[1].html_content.starts_with("<ul>"));
        assert!(fitted.pages[1].html_content.contains('7'));
    }

    #[test]
    fn test_trailing_heading_stays_in_its_chapter() {
        let config = config_for_lines(5.5);
        let html = format!("{}<h2>End</h2>", paragraphs(4));
        let fitted = fit_content(
            &book(vec![chapter("c1", &html), chapter("c2", &paragraphs(1))]),
            &config,
            Some(&line_counter),
            None,
        );

        assert_eq!(fitted.total_pages, 2);
        assert_eq!(fitted.pages[0].chapter_id, "c1");
        assert_eq!(fitted.pages[0].segments.len(), 5);
        assert_eq!(fitted.pages[0].segments[4].segment_type, SegmentType::Heading);
        assert!(!fitted.pages[0].overflow);
        assert_eq!(fitted.pages[1].chapter_id, "c2");
        assert_eq!(fitted.pages[1].segments.len(), 1);
    }

    #[test]
    fn test_empty_chapter_gets_a_page() {
        let config = FittingConfig::default();
        let fitted = fit_content(
            &book(vec![chapter("c1", ""), chapter("c2", "<p>x</p>")]),
            &config,
            None,
            None,
        );
        assert_eq!(fitted.total_pages, 2);
        assert_eq!(fitted.pages[0].chapter_id, "c1");
        assert!(fitted.pages[0].segments.is_empty());
        assert_eq!(fitted.first_page_of("c2"), Some(1));
    }

    #[test]
    fn test_page_references() {
        let config = config_for_lines(5.5);
        let mut content = book(vec![chapter(
            "c1",
            r##"<p>See<a href="#fn1">1</a></p><p>P2</p><p>P3</p><p>P4</p><p>P5</p><p id="fn1">[1] Note</p>"##,
        )]);
        content.references.push(Reference {
            id: "fn1".to_string(),
            marker: "[1]".to_string(),
            content: "[1] Note".to_string(),
            chapter_id: "c1".to_string(),
        });
        let fitted = fit_content(&content, &config, Some(&line_counter), None);

        assert_eq!(fitted.total_pages, 2);
        assert_eq!(fitted.pages[0].references.len(), 1);
        assert_eq!(fitted.pages[1].references.len(), 1);
    }

    #[test]
    fn test_progress_phases_in_order() {
        let config = FittingConfig::default();
        let mut phases = Vec::new();
        let mut callback = |p: &crate::layout::progress::Progress| phases.push(p.phase);
        fit_content(&book(vec![chapter("c1", "<p>x</p>")]), &config, None, Some(&mut callback));

        assert_eq!(
            phases,
            vec![
                ProgressPhase::Parsing,
                ProgressPhase::Measuring,
                ProgressPhase::Fitting,
                ProgressPhase::Complete,
            ]
        );
    }
}
