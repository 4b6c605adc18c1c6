//! Oracle gateway: the boundary to the external text-completion service.
//!
//! One request in, one untrusted text blob out. The gateway never retries;
//! whether a failed call is worth repeating is the caller's policy.

pub mod error;
pub mod openai;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;

use openai::{ChatProvider, OpenAiAdapter};
use usage::{OracleCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, OracleError};
pub use pricing::*;
pub use types::*;
pub use usage::{CallStatus, NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, OracleError>;
}

pub struct OracleGateway<U: UsageSinkTrait, P: ChatProvider = OpenAiAdapter> {
    provider: P,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait, P: ChatProvider> ChatGateway for OracleGateway<U, P> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, OracleError> {
        OracleGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> OracleGateway<U, OpenAiAdapter> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, OracleError> {
        Ok(Self::new(OpenAiAdapter::from_env()?, usage_sink))
    }
}

impl<U: UsageSinkTrait, P: ChatProvider> OracleGateway<U, P> {
    pub fn new(provider: P, usage_sink: Arc<U>) -> Self {
        Self {
            provider,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, OracleError> {
        tracing::debug!(model = %req.model, caller = req.attribution.caller, "oracle request");
        match self.provider.chat(&req).await {
            Ok(resp) => {
                self.record_usage(&req, &resp, None).await;
                Ok(resp)
            }
            Err(err) => {
                self.record_usage(&req, &ChatResponse::empty(), Some(err.code()))
                    .await;
                Err(err)
            }
        }
    }

    async fn record_usage(&self, req: &ChatRequest, resp: &ChatResponse, error_code: Option<&str>) {
        let record = OracleCallRecord::new("chat/completions", &req.model, req.attribution.caller)
            .tokens(resp.input_tokens, resp.output_tokens)
            .cost(resp.cost_nanodollars)
            .session(req.attribution.session_id)
            .latency(resp.latency.as_millis() as u64);

        let record = match error_code {
            Some(code) => record.error(code),
            None => record,
        };

        self.usage_sink.record(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CannedProvider {
        outcome: fn() -> Result<ChatResponse, OracleError>,
    }

    #[async_trait::async_trait]
    impl ChatProvider for CannedProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse, OracleError> {
            (self.outcome)()
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<OracleCallRecord>>,
    }

    #[async_trait::async_trait]
    impl UsageSinkTrait for CollectingSink {
        async fn record(&self, record: OracleCallRecord) {
            self.records.lock().unwrap().push(record);
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")], Attribution::new("test"))
    }

    #[tokio::test]
    async fn success_is_recorded_once() {
        let sink = Arc::new(CollectingSink::default());
        let gateway = OracleGateway::new(
            CannedProvider {
                outcome: || {
                    Ok(ChatResponse {
                        content: "{}".into(),
                        input_tokens: 3,
                        output_tokens: 4,
                        cost_nanodollars: 10,
                        latency: Duration::from_millis(5),
                        finish_reason: FinishReason::Stop,
                    })
                },
            },
            sink.clone(),
        );

        let resp = gateway.chat(request()).await.unwrap();
        assert_eq!(resp.content, "{}");

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CallStatus::Success);
        assert_eq!(records[0].input_tokens, 3);
        assert_eq!(records[0].caller, "test");
    }

    #[tokio::test]
    async fn failure_is_recorded_and_not_retried() {
        let sink = Arc::new(CollectingSink::default());
        let gateway = OracleGateway::new(
            CannedProvider {
                outcome: || Err(OracleError::status(500, "boom", ErrorContext::new())),
            },
            sink.clone(),
        );

        let err = gateway.chat(request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Status { status: 500, .. }));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_code.as_deref(), Some("status_error"));
    }
}
