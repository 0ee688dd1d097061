mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{gateway, ok, quota_exhausted, rate_limited, ScriptedUpstream, Step};
use exam_tutor::infrastructure::TransportError;
use exam_tutor::models::ModelRequest;
use exam_tutor::GatewayError;
use tokio::time::Instant;

fn request(prompt: &str) -> ModelRequest {
    ModelRequest::user_text("glm-4-flash", prompt)
}

#[tokio::test(start_paused = true)]
async fn concurrent_submissions_run_one_at_a_time_in_order() {
    let upstream = Arc::new(
        ScriptedUpstream::responding(|_| ok("好的")).with_latency(Duration::from_millis(300)),
    );
    let gateway = gateway(upstream.clone());

    let submissions = (0..5).map(|i| gateway.submit(request(&format!("请求{}", i))));
    let results = futures::future::join_all(submissions).await;

    let ids: Vec<u64> = results.into_iter().map(|r| r.unwrap().request_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let calls = upstream.calls();
    let prompts: Vec<_> = calls.iter().map(|c| c.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["请求0", "请求1", "请求2", "请求3", "请求4"]);
    assert!(calls.windows(2).all(|w| w[0].at < w[1].at));
    assert_eq!(upstream.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn quota_exhaustion_fails_without_retry() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![quota_exhausted(), ok("不会用到")]));
    let gateway = gateway(upstream.clone());

    let err = gateway.submit(request("检测错题")).await.unwrap_err();

    assert!(matches!(err, GatewayError::QuotaExhausted { .. }));
    assert!(!err.is_retryable());
    assert_eq!(upstream.call_count(), 1);
    assert_eq!(gateway.stats().retried, 0);
    assert_eq!(gateway.stats().failed, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_on_schedule_then_succeed() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![
        rate_limited(),
        rate_limited(),
        ok("第4题"),
    ]));
    let gateway = gateway(upstream.clone());

    let start = Instant::now();
    let response = gateway.submit(request("检测错题")).await.unwrap();

    assert_eq!(response.content, "第4题");
    assert_eq!(response.retries, 2);
    assert_eq!(response.usage.unwrap().total_tokens, 20);
    assert_eq!(upstream.call_count(), 3);
    assert_eq!(gateway.stats().retried, 2);

    // 调度延迟 1 + 退避 3 + 6
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    let calls = upstream.calls();
    assert_eq!(calls[1].at - calls[0].at, Duration::from_secs(3));
    assert_eq!(calls[2].at - calls[1].at, Duration::from_secs(6));
    assert!(calls.iter().all(|c| c.request_id == 1));
}

#[tokio::test(start_paused = true)]
async fn rate_limits_exhaust_attempts() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![
        rate_limited(),
        rate_limited(),
        rate_limited(),
        ok("来不及了"),
    ]));
    let gateway = gateway(upstream.clone());

    let err = gateway.submit(request("检测错题")).await.unwrap_err();

    match err {
        GatewayError::RateLimited {
            attempts, message, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("并发数过高"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(upstream.call_count(), 3);
    assert_eq!(gateway.stats().retried, 2);
}

#[tokio::test(start_paused = true)]
async fn empty_content_is_retried_as_malformed() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![ok("   "), ok("诊断结果")]));
    let gateway = gateway(upstream.clone());

    let start = Instant::now();
    let response = gateway.submit(request("诊断")).await.unwrap();

    assert_eq!(response.content, "诊断结果");
    assert_eq!(response.retries, 1);
    assert_eq!(start.elapsed(), Duration::from_secs(1 + 2));
}

#[tokio::test(start_paused = true)]
async fn malformed_responses_surface_after_retries() {
    let missing_choices = Step::Reply(200, r#"{"id": "abc"}"#.to_string());
    let upstream = Arc::new(ScriptedUpstream::new(vec![
        missing_choices.clone(),
        missing_choices.clone(),
        missing_choices,
    ]));
    let gateway = gateway(upstream.clone());

    let err = gateway.submit(request("诊断")).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::MalformedUpstreamResponse { attempts: 3, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn timeouts_use_network_schedule() {
    let timeout = || Step::Fail(TransportError::Timeout("operation timed out".to_string()));
    let upstream = Arc::new(ScriptedUpstream::new(vec![timeout(), timeout(), timeout()]));
    let gateway = gateway(upstream.clone());

    let start = Instant::now();
    let err = gateway.submit(request("解题")).await.unwrap_err();

    assert!(matches!(err, GatewayError::Timeout { attempts: 3, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4));
}

#[tokio::test(start_paused = true)]
async fn other_status_codes_are_terminal() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![
        Step::Reply(401, common::error_body("令牌无效")),
        ok("不会用到"),
    ]));
    let gateway = gateway(upstream.clone());

    let err = gateway.submit(request("检测")).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::Upstream {
            request_id: 1,
            status: 401,
            message: "令牌无效".to_string()
        }
    );
    assert_eq!(upstream.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn skip_delay_dispatches_immediately() {
    let upstream = Arc::new(ScriptedUpstream::new(vec![ok("数学"), ok("好的")]));
    let gateway = gateway(upstream.clone());

    let start = Instant::now();
    gateway.submit(request("学科").skip_delay(true)).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    gateway.submit(request("分析")).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(1));

    let ids: Vec<_> = upstream.calls().iter().map(|c| c.request_id).collect();
    assert_eq!(ids, vec![1, 2]);
}
