//! セッションとコマンド実行
//!
//! `Session` は稼働中のデバッガ1つを表します。各コンポーネントは
//! `&mut Session` を借用し、ホストとのやり取りはすべて `execute` 系のメソッドを経由します。

use crate::argv::ArgvTokenizer;
use crate::breakpoint::BreakpointManager;
use crate::expr_eval::ExpressionEvaluator;
use crate::parse::OutputParser;
use crate::registers::Registers;
use crate::status::{ProcessStatus, StatusTracker};
use crate::target::TargetInfo;
use crate::Result;
use tsuna_host::{Channel, GdbChannel, GdbConfig, HostError, ReplyStatus, SimHost};
use tracing::debug;

/// セッションの動作設定
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// `execute` の出力を標準出力にも表示する
    pub echo: bool,
}

/// デバッガセッション
pub struct Session {
    /// ホストへのチャネル
    channel: Box<dyn Channel>,
    /// 出力パーサ
    parser: OutputParser,
    options: SessionOptions,
}

impl Session {
    /// チャネルからセッションを作成する
    pub fn new(channel: Box<dyn Channel>) -> Result<Self> {
        Self::with_options(channel, SessionOptions::default())
    }

    /// 設定を指定してセッションを作成する
    pub fn with_options(channel: Box<dyn Channel>, options: SessionOptions) -> Result<Self> {
        Ok(Self {
            channel,
            parser: OutputParser::new()?,
            options,
        })
    }

    /// GDBを起動してセッションを作成する
    pub fn spawn_gdb(config: &GdbConfig) -> Result<Self> {
        Self::spawn_gdb_with_options(config, SessionOptions::default())
    }

    /// 設定を指定してGDBを起動し、セッションを作成する
    pub fn spawn_gdb_with_options(config: &GdbConfig, options: SessionOptions) -> Result<Self> {
        let channel = GdbChannel::spawn(config)?;
        Self::with_options(Box::new(channel), options)
    }

    /// シミュレーションホスト上のセッションを作成する
    pub fn simulated() -> Result<Self> {
        Self::new(Box::new(SimHost::new()))
    }

    /// 設定を取得する
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// ホストがまだ応答可能かどうか
    pub fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }

    /// 出力パーサを取得する
    pub fn parser(&self) -> &OutputParser {
        &self.parser
    }

    /// ディレクティブを実行し、出力を取得する
    ///
    /// 未知のコマンドや失敗したディレクティブはNoneになります。
    /// `Err` はホストが終了した場合など、チャネル自体の失敗に限られます。
    pub fn execute(&mut self, directive: &str) -> Result<Option<String>> {
        let output = self.request(directive)?;
        if self.options.echo {
            if let Some(text) = &output {
                print!("{}", text);
            }
        }
        Ok(output)
    }

    /// ディレクティブを実行し、表示せずに出力だけを取得する
    ///
    /// 末尾の改行は取り除かれます。
    pub fn execute_redirect(&mut self, directive: &str) -> Result<Option<String>> {
        let output = self.request(directive)?;
        Ok(output.map(|text| text.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// ディレクティブを実行し、出力を行ごとに分割して取得する
    pub fn execute_lines(&mut self, directive: &str) -> Result<Option<Vec<String>>> {
        let output = self.execute_redirect(directive)?;
        Ok(output.map(|text| text.lines().map(str::to_string).collect()))
    }

    fn request(&mut self, directive: &str) -> Result<Option<String>> {
        let reply = self.channel.request(directive)?;
        match reply.status {
            ReplyStatus::Done => Ok(Some(reply.console)),
            ReplyStatus::Error(msg) => {
                debug!("Directive '{}' failed: {}", directive, msg);
                if self.options.echo {
                    eprint!("{}", reply.log);
                }
                Ok(None)
            }
            ReplyStatus::Exited => Err(HostError::Exited.into()),
        }
    }

    /// 式を評価して正規形の16進数文字列を取得する
    pub fn evaluate(&mut self, expr: &str) -> Result<Option<String>> {
        ExpressionEvaluator::new(self).evaluate(expr)
    }

    /// 引数文字列をトークンに分割する（`$`参照は評価値に置き換える）
    pub fn tokenize(&mut self, raw: &str) -> Result<Vec<String>> {
        ArgvTokenizer::new(self).tokenize(raw)
    }

    /// 現在のプロセス状態を取得する
    pub fn status(&mut self) -> Result<ProcessStatus> {
        StatusTracker::new(self).get_status()
    }

    /// レジスタアクセスを取得する
    pub fn registers(&mut self) -> Registers<'_> {
        Registers::new(self)
    }

    /// ブレークポイント管理を取得する
    pub fn breakpoints(&mut self) -> BreakpointManager<'_> {
        BreakpointManager::new(self)
    }

    /// ターゲット情報を取得する
    pub fn target(&mut self) -> TargetInfo<'_> {
        TargetInfo::new(self)
    }
}
