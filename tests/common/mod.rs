#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::StatusCode;
use share_link_proxy::resolver::{
    DirectLink, ExtractionError, ResolveError, ShareResolver, SourceUrl,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 模拟解析结果
#[derive(Debug, Clone)]
pub enum Step {
    Link(String),
    /// 页面上找不到下载按钮
    Missing,
    /// 分享页返回错误状态码
    PageStatus(u16),
}

/// 按脚本依次返回结果的解析器，脚本用尽后重复最后一步
pub struct ScriptedResolver {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedResolver {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// 每次解析前等待，用于制造并发重叠
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = steps.pop_front() {
            *last = Some(step.clone());
            step
        } else {
            last.clone().expect("resolver script is empty")
        }
    }
}

#[async_trait]
impl ShareResolver for ScriptedResolver {
    async fn resolve(&self, _source: &SourceUrl) -> Result<DirectLink, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            Step::Link(link) => Ok(DirectLink::new(link)),
            Step::Missing => Err(ResolveError::Extraction(ExtractionError::ElementMissing {
                element_id: "downloadButton".to_string(),
            })),
            Step::PageStatus(code) => Err(ResolveError::Status(
                StatusCode::from_u16(code).unwrap(),
            )),
        }
    }
}

pub fn source() -> SourceUrl {
    SourceUrl::parse("https://share.example.com/file/abc123/movie.mp4/file").unwrap()
}
