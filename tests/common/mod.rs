#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use exam_tutor::config::Config;
use exam_tutor::infrastructure::{ChatUpstream, ModelGateway, TransportError, UpstreamReply};
use exam_tutor::models::{ImagePayload, ModelRequest};
use exam_tutor::Pipeline;
use tokio::time::Instant;

/// 一次尝试的结果
#[derive(Debug, Clone)]
pub enum Step {
    Reply(u16, String),
    Fail(TransportError),
}

/// 上游收到的一次调用
#[derive(Debug, Clone)]
pub struct Call {
    pub request_id: u64,
    pub prompt: String,
    pub at: Instant,
}

type Responder = Box<dyn Fn(&str) -> Step + Send + Sync>;

/// 按脚本回复的上游
///
/// 先消费脚本队列，队列为空时交给 responder（按提示词决定回复）。
pub struct ScriptedUpstream {
    script: Mutex<VecDeque<Step>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedUpstream {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            responder: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn responding(responder: impl Fn(&str) -> Step + Send + Sync + 'static) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatUpstream for ScriptedUpstream {
    async fn dispatch(
        &self,
        request_id: u64,
        request: &ModelRequest,
    ) -> Result<UpstreamReply, TransportError> {
        let prompt = request.last_user_text().unwrap_or_default();
        self.calls.lock().unwrap().push(Call {
            request_id,
            prompt: prompt.clone(),
            at: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().unwrap().pop_front();
        let step = match (scripted, &self.responder) {
            (Some(step), _) => step,
            (None, Some(responder)) => responder(&prompt),
            (None, None) => Step::Reply(500, error_body("script exhausted")),
        };

        match step {
            Step::Reply(status, body) => Ok(UpstreamReply::new(status, body)),
            Step::Fail(err) => Err(err),
        }
    }
}

/// 成功响应体
pub fn ok_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    })
    .to_string()
}

pub fn error_body(message: &str) -> String {
    serde_json::json!({"error": {"message": message}}).to_string()
}

pub fn ok(content: &str) -> Step {
    Step::Reply(200, ok_body(content))
}

pub fn rate_limited() -> Step {
    Step::Reply(429, error_body("您当前使用该API的并发数过高，请降低并发"))
}

pub fn quota_exhausted() -> Step {
    Step::Reply(429, error_body("您的账户已欠费，请充值后重试"))
}

pub fn gateway(upstream: Arc<ScriptedUpstream>) -> Arc<ModelGateway> {
    Arc::new(ModelGateway::new(upstream, Config::default().retry_policy()))
}

pub fn pipeline(upstream: Arc<ScriptedUpstream>) -> Pipeline {
    let config = Config::default();
    Pipeline::new(gateway(upstream), &config)
}

pub fn image() -> ImagePayload {
    ImagePayload::from_bytes(b"fake-jpeg-bytes", "image/jpeg").unwrap()
}
