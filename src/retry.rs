use std::time::Duration;

use reqwest::StatusCode;

use crate::{
    transport::{PreparedRequest, Transport, TransportResponse},
    BoxError, Context, Error, ErrorList,
};

/// Upper bound applied to the configured number of retries.
pub const MAX_RETRIES: u32 = 10;

/// How the wait between attempts grows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BackoffPolicy {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * attempt²`
    Exponential,
}

impl BackoffPolicy {
    /// Delay inserted after the failed attempt number `attempt` (1-indexed).
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        let multiplier = match self {
            Self::Linear => attempt,
            Self::Exponential => attempt.saturating_mul(attempt),
        };
        base.saturating_mul(multiplier)
    }
}

/// Retry budget and backoff configuration for one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    retries: u32,
    base_delay: Duration,
    backoff: BackoffPolicy,
    status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_secs(1),
            backoff: BackoffPolicy::Linear,
            status_codes: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy; `retries` is clamped to [`MAX_RETRIES`].
    ///
    /// `status_codes` lists response statuses that count as a failed
    /// attempt even though a response was received.
    pub fn new<I>(
        retries: u32,
        base_delay: Duration,
        backoff: BackoffPolicy,
        status_codes: I,
    ) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            retries: retries.min(MAX_RETRIES),
            base_delay,
            backoff,
            status_codes: status_codes.into_iter().collect(),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Number of sends the loop performs at most. Never less than one.
    pub fn max_attempts(&self) -> usize {
        self.retries.max(1) as usize
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    pub fn status_codes(&self) -> &[u16] {
        &self.status_codes
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.status_codes.contains(&status.as_u16())
    }

    /// Wait inserted after the failed attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.backoff.delay(self.base_delay, attempt)
    }
}

/// Result of one send.
enum Attempt {
    Success(TransportResponse),
    RetryableStatus(TransportResponse),
    TransportFailed(BoxError),
    Interrupted(Error),
}

/// What the send loop produced: the last response received (if any) and
/// every per-attempt error in order.
pub(crate) struct SendOutcome {
    pub(crate) response: Option<TransportResponse>,
    pub(crate) errors: ErrorList,
}

/// Sends `request` until it succeeds, the attempt budget runs out, or the
/// context finishes.
///
/// Only transport failures and statuses listed in the policy are retried;
/// any other status ends the loop, whatever its class.
pub(crate) async fn execute(
    transport: &dyn Transport,
    request: &PreparedRequest,
    policy: &RetryPolicy,
    ctx: &Context,
) -> SendOutcome {
    let max_attempts = policy.max_attempts();
    let mut errors = ErrorList::new();
    let mut last_response = None;
    let mut attempt = 0usize;

    loop {
        attempt += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt,
            max_attempts,
            method = %request.method,
            url = %request.url,
            "sending HTTP request"
        );

        match send_once(transport, request, policy, ctx).await {
            Attempt::Success(response) => {
                return SendOutcome {
                    response: Some(response),
                    errors,
                };
            }
            Attempt::RetryableStatus(response) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, status = %response.status, "received retryable status");

                errors.push(Error::RetryableStatus {
                    status: response.status,
                    attempt,
                });
                last_response = Some(response);
            }
            Attempt::TransportFailed(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %err, "HTTP request failed");

                errors.push(Error::transport(err));
            }
            Attempt::Interrupted(reason) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %reason, "request interrupted by context");

                errors.push(reason);
                break;
            }
        }

        if attempt >= max_attempts {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempts = attempt, "retry budget exhausted");
            break;
        }

        let delay = policy.delay_for(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before retry");

        if let Err(reason) = ctx.sleep(delay).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, error = %reason, "backoff interrupted by context");

            errors.push(reason);
            break;
        }
    }

    SendOutcome {
        response: last_response,
        errors,
    }
}

async fn send_once(
    transport: &dyn Transport,
    request: &PreparedRequest,
    policy: &RetryPolicy,
    ctx: &Context,
) -> Attempt {
    let result = tokio::select! {
        biased;
        reason = ctx.done() => return Attempt::Interrupted(reason),
        result = transport.send(request) => result,
    };

    match result {
        Ok(response) if policy.is_retryable_status(response.status) => {
            Attempt::RetryableStatus(response)
        }
        Ok(response) => Attempt::Success(response),
        Err(err) => Attempt::TransportFailed(err),
    }
}
