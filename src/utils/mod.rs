pub mod breaker;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use retry::{retry_transient, RetryPolicy, Transient};
