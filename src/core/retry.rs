//! Backoff shared by the HTTP providers.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

const BASE_DELAY_MS: u64 = 250;
const MAX_EXPONENT: u32 = 5;

/// Full-jitter exponential backoff: a random delay in `[0, base * 2^attempt]`,
/// with the exponent capped.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ceiling = BASE_DELAY_MS << attempt.min(MAX_EXPONENT);
    let jittered = rand::rng().random_range(0..=ceiling);
    Duration::from_millis(jittered)
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_under_capped_ceiling() {
        for attempt in 0..20 {
            let delay = backoff_delay(attempt);
            assert!(delay <= Duration::from_millis(BASE_DELAY_MS << MAX_EXPONENT));
        }
    }

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
