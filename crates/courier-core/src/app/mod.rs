//! App - アプリケーション層
//!
//! ports を組み合わせて request の実行ロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ExecutionEngine / EngineBuilder**: エンジンの構築と dispatch（sync / async）
//! - **AttemptLoop**: attempt ごとの状態遷移（retry 判断、delivery）
//! - **ResultFuture**: async request の結果（1 回だけ遷移）

mod attempt;
pub mod engine;
pub mod future;

// 主要な型を再エクスポート
pub use self::engine::{EngineBuilder, Execution, ExecutionEngine};
pub use self::future::{FutureState, ResultFuture};
