//! ResponseFactory port - raw reply（または不在）から Response を作る

use std::time::Instant;

use super::transport::RawReply;
use crate::domain::{ProgressReporter, RequestDescriptor, Response};

/// ResponseFactory は常に Response を返す（reply が無ければ sentinel）
///
/// # 設計原則
/// - status / headers はそのまま写す
/// - body は遅延読み込み + キャッシュ
/// - success 判定は 1 response につき 1 回だけ
/// - `progress` があれば body の読み込み中に進捗を報告する
pub trait ResponseFactory: Send + Sync {
    fn create_response(
        &self,
        descriptor: &RequestDescriptor,
        reply: Option<RawReply>,
        attempt: u32,
        started_at: Instant,
        progress: Option<ProgressReporter>,
    ) -> Response;
}
