//! 流式输出 - 编排层
//!
//! 把一次完整的结果拆成逐字的片段，最后跟一个结束标记。
//! 片段严格按原文顺序产生；流是惰性的，消费方丢弃后不再产生新片段。

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::{json, Value as JsonValue};

/// 流式事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// 进度提示
    Status { status: String, message: String },
    /// 一个字符
    Content(String),
    /// 结束
    Done,
    /// 结束并附带结构化结果
    Finished(JsonValue),
    /// 终止性错误（同时表示结束）
    Error(String),
}

impl StreamEvent {
    pub fn status(status: impl Into<String>, message: impl Into<String>) -> Self {
        StreamEvent::Status {
            status: status.into(),
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Done | StreamEvent::Finished(_) | StreamEvent::Error(_)
        )
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            StreamEvent::Status { status, message } => json!({ "status": status, "message": message }),
            StreamEvent::Content(content) => json!({ "content": content }),
            StreamEvent::Done => json!({ "done": true }),
            StreamEvent::Finished(data) => json!({ "done": true, "data": data }),
            StreamEvent::Error(error) => json!({ "error": error, "done": true }),
        }
    }

    /// SSE 格式：`data: {json}\n\n`
    pub fn to_sse_line(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

/// 逐字片段，最后一个事件是 `Done`
pub fn char_fragments(text: String) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let fragments: Vec<StreamEvent> = text
        .chars()
        .map(|c| StreamEvent::Content(c.to_string()))
        .chain(std::iter::once(StreamEvent::Done))
        .collect();
    stream::iter(fragments)
}

/// 成功时逐字输出，失败时只输出一个 `Error`
pub fn into_event_stream<E: Display>(result: Result<String, E>) -> BoxStream<'static, StreamEvent> {
    match result {
        Ok(text) => char_fragments(text).boxed(),
        Err(e) => stream::iter([StreamEvent::Error(e.to_string())]).boxed(),
    }
}

/// 逐字输出说明文字，最后附上结构化结果
pub fn into_report_stream<E: Display>(
    result: Result<(String, JsonValue), E>,
) -> BoxStream<'static, StreamEvent> {
    match result {
        Ok((text, data)) => {
            let events: Vec<StreamEvent> = text
                .chars()
                .map(|c| StreamEvent::Content(c.to_string()))
                .chain(std::iter::once(StreamEvent::Finished(data)))
                .collect();
            stream::iter(events).boxed()
        }
        Err(e) => stream::iter([StreamEvent::Error(e.to_string())]).boxed(),
    }
}

/// 和 `stream_result` 相同，但结束事件携带结构化结果
pub fn stream_report<'a, F, E>(
    status: &str,
    message: &str,
    fut: F,
) -> impl Stream<Item = StreamEvent> + 'a
where
    F: Future<Output = Result<(String, JsonValue), E>> + 'a,
    E: Display + 'a,
{
    stream::iter([StreamEvent::status(status, message)])
        .chain(stream::once(fut).flat_map(into_report_stream))
}

/// 先输出进度提示，再等待结果并逐字输出
///
/// `fut` 在第一个进度事件被消费后才开始执行。
pub fn stream_result<'a, F, E>(
    status: &str,
    message: &str,
    fut: F,
) -> impl Stream<Item = StreamEvent> + 'a
where
    F: Future<Output = Result<String, E>> + 'a,
    E: Display + 'a,
{
    stream::iter([StreamEvent::status(status, message)])
        .chain(stream::once(fut).flat_map(into_event_stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_fragments_in_order() {
        let events: Vec<_> = tokio_test::block_on(char_fragments("你好!".to_string()).collect());
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("你".to_string()),
                StreamEvent::Content("好".to_string()),
                StreamEvent::Content("!".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_error_is_single_terminal_event() {
        let events: Vec<_> = into_event_stream::<String>(Err("余额不足".to_string()))
            .collect()
            .await;
        assert_eq!(events, vec![StreamEvent::Error("余额不足".to_string())]);
        assert!(events[0].is_terminal());
        let line = events[0].to_sse_line();
        assert!(line.starts_with("data: ") && line.ends_with("\n\n"));
        let payload: JsonValue = serde_json::from_str(line["data: ".len()..].trim()).unwrap();
        assert_eq!(payload, json!({ "error": "余额不足", "done": true }));
    }

    #[tokio::test]
    async fn test_stream_result_starts_with_status() {
        let events: Vec<_> = stream_result("thinking", "思考中", async { Ok::<_, String>("嗯".to_string()) })
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::status("thinking", "思考中"));
        assert_eq!(events[1], StreamEvent::Content("嗯".to_string()));
        assert_eq!(events[2], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_stream_report_ends_with_data() {
        let events: Vec<_> = stream_report("analyzing", "分析中", async {
            Ok::<_, String>(("好".to_string(), json!({ "knowledge_point": "方程" })))
        })
        .collect()
        .await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], StreamEvent::Content("好".to_string()));
        assert!(events[2].is_terminal());
        assert_eq!(
            events[2].to_json(),
            json!({ "done": true, "data": { "knowledge_point": "方程" } })
        );
    }
}
