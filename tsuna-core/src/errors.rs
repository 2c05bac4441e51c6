//! エラー型とエラーメッセージ定数

/// 式が整数値を生成しなかった場合のエラーメッセージ
pub const ERR_NO_VALUE: &str = "Expression has no integer value";

/// アドレスとして解釈できない場合のエラーメッセージ
pub const ERR_INVALID_ADDRESS: &str = "Invalid address";

/// ブレークポイントが見つからない場合のエラーメッセージ
pub const ERR_BREAKPOINT_NOT_FOUND: &str = "Breakpoint not found";

/// レジスタアクセスのエラー
///
/// 値0は正当なレジスタ値なので、「見つからない」は必ずエラーとして区別します。
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// ホストが知らないレジスタ名
    #[error("Unknown register '{0}'")]
    Unknown(String),
    /// レジスタ名は正しいが値を読めない（プロセスが存在しないなど）
    #[error("Register '{0}' is not available")]
    Unavailable(String),
    /// チャネルレベルの失敗
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}
