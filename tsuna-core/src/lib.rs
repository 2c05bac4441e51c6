//! Tsuna 自動化レイヤーのコア機能
//!
//! このクレートは、稼働中のデバッガセッションに対してディレクティブを発行し、
//! その結果を型付きの値（16進数値、レジスタ値、プロセス状態、ブレークポイント表）として
//! 取り出す機能を提供します。

pub mod session;
pub mod expr_eval;
pub mod argv;
pub mod registers;
pub mod status;
pub mod breakpoint;
pub mod target;
pub mod command;
pub mod errors;
pub mod parse;

pub use session::{Session, SessionOptions};
pub use expr_eval::ExpressionEvaluator;
pub use argv::ArgvTokenizer;
pub use registers::{RegisterValue, Registers};
pub use status::{ProcessStatus, StatusTracker};
pub use breakpoint::{Breakpoint, BreakpointId, BreakpointManager};
pub use target::TargetInfo;
pub use command::Command;
pub use errors::RegisterError;

// 他のクレートから使用するために再エクスポート
pub use tsuna_host::{Channel, GdbChannel, GdbConfig, SimHost};

/// 自動化レイヤーの結果型
pub type Result<T> = anyhow::Result<T>;
