//! 进度回报
//!
//! 只用于宿主界面展示，不影响结果。

use serde::{Deserialize, Serialize};

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Parsing,
    Measuring,
    Fitting,
    Complete,
}

/// 一次进度通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub phase: ProgressPhase,
    /// 0-100
    pub percent: u8,
    pub current_chapter: Option<String>,
}

/// 进度回调
pub type ProgressCallback<'a> = &'a mut dyn FnMut(&Progress);

/// 可选回调的包装，没有回调时什么也不做
pub(crate) struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Self { callback }
    }

    pub(crate) fn report(&mut self, phase: ProgressPhase, percent: u8, current_chapter: Option<&str>) {
        if let Some(callback) = self.callback.as_mut() {
            callback(&Progress {
                phase,
                percent: percent.min(100),
                current_chapter: current_chapter.map(str::to_string),
            });
        }
    }

    /// 在`[start, end]`区间内按`done/total`插值
    pub(crate) fn report_step(
        &mut self,
        phase: ProgressPhase,
        (start, end): (u8, u8),
        done: usize,
        total: usize,
        current_chapter: Option<&str>,
    ) {
        let span = end.saturating_sub(start) as usize;
        let offset = if total == 0 { span } else { span * done.min(total) / total };
        self.report(phase, start.saturating_add(offset as u8), current_chapter);
    }
}
