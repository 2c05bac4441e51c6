//! ディレクティブチャネル

use crate::Result;

/// ホストからの応答の種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// ディレクティブが正常に完了した
    Done,
    /// ホストがディレクティブを拒否した（未知のコマンド、評価エラーなど）
    Error(String),
    /// ホスト自体が終了した
    Exited,
}

/// 1つのディレクティブに対する応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    /// ディレクティブが生成したコンソール出力
    pub console: String,
    /// ホストのログ出力（エラーメッセージ、警告）
    pub log: String,
}

impl Reply {
    /// 成功した応答を作成する
    pub fn done(console: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Done,
            console: console.into(),
            log: String::new(),
        }
    }

    /// エラー応答を作成する
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: ReplyStatus::Error(message.clone()),
            console: String::new(),
            log: format!("{}\n", message),
        }
    }

    /// ディレクティブが成功したかどうか
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Done
    }

    /// エラーメッセージを取得する
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ReplyStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// チャネルレベルのエラー
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// ホストプロセスがすでに終了している
    #[error("debugger host has exited")]
    Exited,
    /// ホストの出力を解釈できない
    #[error("unexpected host output: {0}")]
    Protocol(String),
}

/// テキストで要求と応答をやり取りする同期チャネル
///
/// 1回の`request`は1つのディレクティブに対応し、その出力がすべて
/// 取り込まれるまで戻りません。
pub trait Channel {
    /// ディレクティブを送信して応答を待つ
    fn request(&mut self, directive: &str) -> Result<Reply>;

    /// ホストがまだ応答可能かどうか
    fn is_alive(&self) -> bool;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn request(&mut self, directive: &str) -> Result<Reply> {
        (**self).request(directive)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}
