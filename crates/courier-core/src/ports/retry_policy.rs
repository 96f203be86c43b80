//! RetryPolicy port - 失敗した attempt の次の一手を決める
//!
//! # 設計原則
//! - 純粋関数（RetryContext → RetryDecision）
//! - 副作用なし、sleep しない（delay の実行は engine の責務）
//! - engine を変えずに差し替え可能（exponential backoff, circuit breaker など）

use crate::domain::{RetryContext, RetryDecision};

pub trait RetryPolicy: Send + Sync {
    fn decide(&self, context: &RetryContext) -> RetryDecision;

    fn should_retry(&self, context: &RetryContext) -> bool {
        self.decide(context).is_retry()
    }
}
