// ============================================================================
// Customer Notification Client
// ============================================================================
//
// Posts approval notices to the notification service. Strictly best-effort:
// every call site spawns this detached from the request path and only logs
// failures, so there is no breaker here, just a short retry.
//
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::utils::retry::{retry_transient, RetryPolicy};

use super::{ApprovalNotice, UpstreamError};

const SERVICE: &str = "notifier";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell the customer their payment went through.
    async fn sale_approved(&self, notice: &ApprovalNotice) -> Result<(), UpstreamError>;
}

pub struct HttpNotifier {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpNotifier {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn sale_approved(&self, notice: &ApprovalNotice) -> Result<(), UpstreamError> {
        let url = format!("{}/v1/notifications/sale-approved", self.base_url);
        retry_transient(&self.retry, SERVICE, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .post(url)
                    .json(notice)
                    .send()
                    .await
                    .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(UpstreamError::Status {
                        service: SERVICE,
                        status: status.as_u16(),
                    })
                }
            }
        })
        .await
    }
}
