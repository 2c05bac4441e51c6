//! Tsuna ホスト側チャネル
//!
//! このクレートは、デバッガ（GDB）へディレクティブを送り、その出力を受け取る
//! 低レベルのテキストチャネルを提供します。
//! GDB/MIサブプロセス、MIレコードのパーサ、テスト用のシミュレーションホスト、
//! x86レジスタのレイアウト表を含みます。

pub mod channel;
pub mod mi;
pub mod gdb;
pub mod regs;
pub mod calc;
pub mod sim;

pub use channel::{Channel, HostError, Reply, ReplyStatus};
pub use gdb::{GdbChannel, GdbConfig};
pub use regs::RegisterSpec;
pub use sim::SimHost;

/// ホスト操作の結果型
pub type Result<T> = anyhow::Result<T>;
