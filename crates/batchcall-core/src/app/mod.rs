//! App - アプリケーション層
//!
//! ports と domain を組み合わせて、関数呼び出しをバッチジョブとして実行します。
//!
//! # 主要コンポーネント
//! - **Job**: submit → poll/wait → result のライフサイクル
//! - **ScriptTemplate**: ジョブスクリプトの生成（`#SBATCH` 行、before/after、ランチャー）
//! - **runner**: リモート側で payload を実行し、outcome ファイルを書く
//! - **JobConfig**: 作業ディレクトリ、ポーリング間隔、タイムアウトなど
//! - **JobPaths**: ジョブごとの成果物パス

pub mod config;
pub mod job;
pub mod layout;
pub mod runner;
pub mod script;
pub mod status;

// 主要な型を再エクスポート
pub use self::config::{ConfigError, JobConfig};
pub use self::job::{Job, JobPoll};
pub use self::layout::JobPaths;
pub use self::runner::{RunStatus, RunnerError, run_payload};
pub use self::script::{ScriptContext, ScriptTemplate};
pub use self::status::JobStatusView;
