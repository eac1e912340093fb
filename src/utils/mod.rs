pub mod retry;

pub use retry::{
    jittered, retry_on_transient, sleep_or_cancel, IsTransient, RetryConfig, RetryResult,
};
