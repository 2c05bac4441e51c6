//! GDB/MIサブプロセスによるチャネル

use crate::channel::{Channel, HostError, Reply, ReplyStatus};
use crate::mi::{self, AsyncKind, Record, ResultClass, StreamKind};
use crate::Result;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, trace, warn};

/// GDBプロセスの起動設定
#[derive(Debug, Clone)]
pub struct GdbConfig {
    /// GDB実行ファイルのパス
    pub gdb_path: PathBuf,
    /// 追加のコマンドライン引数
    pub gdb_args: Vec<String>,
    /// インフェリアの入出力を向ける端末（MIの出力と混ざらないようにする）
    pub inferior_tty: Option<PathBuf>,
    /// 起動直後に実行するディレクティブ
    pub init_directives: Vec<String>,
}

impl Default for GdbConfig {
    fn default() -> Self {
        Self {
            gdb_path: PathBuf::from("gdb"),
            gdb_args: Vec::new(),
            inferior_tty: Some(PathBuf::from("/dev/null")),
            init_directives: Vec::new(),
        }
    }
}

/// MI出力を行単位で読み、応答ごとにまとめるリーダー
///
/// EOFまたは`^exit`を読んだ時点で以降は応答不能として扱います。
pub(crate) struct MiReader<R> {
    reader: R,
    alive: bool,
}

impl<R: BufRead> MiReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            alive: true,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive
    }

    /// 1つの結果レコードと、それに続くプロンプトまでを読み取る
    ///
    /// `^running`を受け取った場合は`*stopped`を受け取るまで待ち続けます。
    pub(crate) fn read_reply(&mut self) -> Result<Reply> {
        let mut console = String::new();
        let mut log = String::new();
        let mut status = None;
        let mut waiting_for_stop = false;

        loop {
            let Some(line) = self.next_line()? else {
                self.alive = false;
                return Ok(Reply {
                    status: ReplyStatus::Exited,
                    console,
                    log,
                });
            };

            match mi::parse_line(&line)? {
                Record::Stream { kind, text } => match kind {
                    StreamKind::Console | StreamKind::Target => console.push_str(&text),
                    StreamKind::Log => log.push_str(&text),
                },
                Record::Result(class) => match class {
                    ResultClass::Done | ResultClass::Connected => status = Some(ReplyStatus::Done),
                    ResultClass::Running => {
                        status = Some(ReplyStatus::Done);
                        waiting_for_stop = true;
                    }
                    ResultClass::Error(msg) => status = Some(ReplyStatus::Error(msg)),
                    ResultClass::Exit => {
                        self.alive = false;
                        return Ok(Reply {
                            status: ReplyStatus::Exited,
                            console,
                            log,
                        });
                    }
                },
                Record::Async { kind: AsyncKind::Exec, class, .. } if class == "stopped" => {
                    waiting_for_stop = false;
                }
                Record::Async { .. } => {}
                Record::Prompt => {
                    if let Some(status) = status.as_ref() {
                        if !waiting_for_stop {
                            return Ok(Reply {
                                status: status.clone(),
                                console,
                                log,
                            });
                        }
                    }
                }
                Record::Other(text) => trace!("inferior: {}", text),
            }
        }
    }

    /// プロンプトが現れるまで出力を読み捨てる
    pub(crate) fn read_until_prompt(&mut self) -> Result<()> {
        while let Some(line) = self.next_line()? {
            if mi::parse_line(&line)? == Record::Prompt {
                return Ok(());
            }
        }
        self.alive = false;
        Err(HostError::Exited.into())
    }

    /// 1行読み取る（EOFならNone）
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        trace!("mi -> {}", line.trim_end());
        Ok(Some(line))
    }
}

/// GDBをMIモードで起動し、コンソールディレクティブを中継するチャネル
pub struct GdbChannel {
    child: Child,
    stdin: ChildStdin,
    reader: MiReader<BufReader<ChildStdout>>,
}

impl GdbChannel {
    /// GDBを起動する
    ///
    /// ページングと確認プロンプトを無効化してから、
    /// 設定された初期化ディレクティブを順に実行します。
    /// インフェリア端末の設定を拒否された場合は起動失敗とします。
    pub fn spawn(config: &GdbConfig) -> Result<Self> {
        debug!("Spawning {}", config.gdb_path.display());

        let mut child = Command::new(&config.gdb_path)
            .args(["--interpreter=mi2", "-q", "-nx"])
            .args(&config.gdb_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn {}: {}", config.gdb_path.display(), e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to open gdb stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to open gdb stdout"))?;

        let mut channel = Self {
            child,
            stdin,
            reader: MiReader::new(BufReader::new(stdout)),
        };

        // 起動時のバナーと最初のプロンプトを読み捨てる
        channel.reader.read_until_prompt()?;

        for setting in STARTUP_SETTINGS {
            let reply = channel.send_raw(setting)?;
            check_startup_reply(setting, &reply, false)?;
        }
        if let Some(tty) = &config.inferior_tty {
            let command = format!("-inferior-tty-set {}", tty.display());
            let reply = channel.send_raw(&command)?;
            check_startup_reply(&command, &reply, true)?;
        }
        for directive in &config.init_directives {
            let reply = channel.request(directive)?;
            if let Some(msg) = reply.error_message() {
                warn!("Init directive '{}' failed: {}", directive, msg);
            }
        }

        Ok(channel)
    }

    /// MIコマンドをそのまま送信して応答を読む
    fn send_raw(&mut self, command: &str) -> Result<Reply> {
        if !self.reader.is_alive() {
            return Err(HostError::Exited.into());
        }

        trace!("mi <- {}", command);
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;

        self.reader.read_reply()
    }
}

/// 起動直後に送るGDBの設定
const STARTUP_SETTINGS: [&str; 3] = [
    "-gdb-set pagination off",
    "-gdb-set confirm off",
    "-gdb-set width 0",
];

/// 起動時のMIコマンドの応答を確認する
///
/// `required`でないコマンドの失敗は警告にとどめます。ホストの終了は常にエラーです。
fn check_startup_reply(command: &str, reply: &Reply, required: bool) -> Result<()> {
    match &reply.status {
        ReplyStatus::Done => Ok(()),
        ReplyStatus::Exited => Err(HostError::Exited.into()),
        ReplyStatus::Error(msg) if required => {
            Err(anyhow::anyhow!("Startup command '{}' failed: {}", command, msg))
        }
        ReplyStatus::Error(msg) => {
            warn!("Startup command '{}' failed: {}", command, msg);
            Ok(())
        }
    }
}

impl Channel for GdbChannel {
    fn request(&mut self, directive: &str) -> Result<Reply> {
        debug!("directive: {}", directive);
        let reply = self.send_raw(&mi::console_command(directive))?;
        debug!("reply: {:?}", reply.status);
        Ok(reply)
    }

    fn is_alive(&self) -> bool {
        self.reader.is_alive()
    }
}

impl Drop for GdbChannel {
    fn drop(&mut self) {
        if self.reader.is_alive() {
            let _ = writeln!(self.stdin, "-gdb-exit");
            let _ = self.stdin.flush();
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
