//! デバッガ出力のパース
//!
//! ホストが返すテキストを型付きの値に変換する処理はすべてこのモジュールに集約します。

use crate::breakpoint::{Breakpoint, BreakpointId};
use crate::registers::RegisterValue;
use crate::status::ProcessStatus;
use crate::Result;
use regex::Regex;
use tracing::warn;

/// アドレス文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
///
/// # Examples
/// ```
/// use tsuna_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal address '{}': {}", s, e))
    } else {
        s.parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", s, e))
    }
}

/// 正規形の16進数文字列に変換する（`0x`プレフィックス、小文字、ゼロ埋めなし）
///
/// # Examples
/// ```
/// use tsuna_core::parse::to_canonical_hex;
///
/// assert_eq!(to_canonical_hex(2), "0x2");
/// assert_eq!(to_canonical_hex(0), "0x0");
/// ```
pub fn to_canonical_hex(value: u64) -> String {
    format!("{:#x}", value)
}

/// 文字列が正規形の16進数かどうか
pub fn is_canonical_hex(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some("0") => true,
        Some(digits) => {
            !digits.is_empty()
                && !digits.starts_with('0')
                && digits.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        }
        None => false,
    }
}

/// `output/x` の結果から整数値を取り出す
///
/// `0x401000 <main+4>` のような後続のシンボル表示は無視します。
/// `void` や集成体（`{...}`）など整数でない値はNone。
pub fn parse_hex_value(text: &str) -> Option<u64> {
    let word = text.split_whitespace().next()?;
    let digits = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// `info inferiors` の選択中インフェリアの行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferiorRow {
    pub pid: Option<i32>,
    pub remote: bool,
    pub executable: Option<String>,
}

/// ホスト出力のパーサ
pub struct OutputParser {
    breakpoint_row: Regex,
    breakpoint_hits: Regex,
    breakpoint_created: Regex,
    stopped_by_signal: Regex,
    selected_inferior: Regex,
    symbols_from: Regex,
    exec_file: Regex,
    register_row: Regex,
    quoted: Regex,
}

impl OutputParser {
    /// パーサを作成する
    pub fn new() -> Result<Self> {
        // 例: 1       breakpoint     keep y   0x0000000000001337 <main+4>
        // 例: 2       hw watchpoint  keep y                      counter
        let breakpoint_row = Regex::new(
            r"^(\d+)\s+(.+?)\s+(keep|del|dis|dstp)\s+([yn])\s*(?:(0x[0-9a-fA-F]+)|<PENDING>|<MULTIPLE>)?\s*(.*?)\s*$",
        )?;
        let breakpoint_hits = Regex::new(r"^\s+breakpoint already hit (\d+) times?")?;
        let breakpoint_created = Regex::new(r"(?m)^(?:Temporary b|B|Hardware assisted b)reakpoint (\d+) at ")?;
        let stopped_by_signal = Regex::new(r"It stopped (?:at|with) signal (\w+)")?;

        // 例: * 1    process 31337     1 (native)           /usr/bin/ls
        let selected_inferior = Regex::new(
            r"(?m)^\*\s+\d+\s+(?:(?:process|Thread|LWP)\s+(\d+)|<null>)(.*)$",
        )?;
        let symbols_from = Regex::new(r#"(?m)^Symbols from "(.*)"\.\s*$"#)?;
        let exec_file = Regex::new(r"`([^']+)', file type")?;
        let register_row = Regex::new(r"^(\w+)\s+(0x[0-9a-fA-F]+)\b")?;
        let quoted = Regex::new(r#""([^"]+)""#)?;

        Ok(Self {
            breakpoint_row,
            breakpoint_hits,
            breakpoint_created,
            stopped_by_signal,
            selected_inferior,
            symbols_from,
            exec_file,
            register_row,
            quoted,
        })
    }

    /// `info breakpoints` の表をパースする
    pub fn breakpoints(&self, text: &str) -> Vec<Breakpoint> {
        let mut table: Vec<Breakpoint> = Vec::new();

        for line in text.lines() {
            if let Some(caps) = self.breakpoint_row.captures(line) {
                let Ok(id) = caps[1].parse::<BreakpointId>() else {
                    warn!("Skipping breakpoint row with bad number: {}", line);
                    continue;
                };
                table.push(Breakpoint {
                    id,
                    kind: caps[2].to_string(),
                    temporary: &caps[3] == "del",
                    enabled: &caps[4] == "y",
                    address: caps
                        .get(5)
                        .and_then(|m| parse_hex_value(m.as_str())),
                    what: caps[6].to_string(),
                    hits: 0,
                });
            } else if let Some(caps) = self.breakpoint_hits.captures(line) {
                if let Some(last) = table.last_mut() {
                    last.hits = caps[1].parse().unwrap_or_default();
                }
            }
        }

        table
    }

    /// `break` の出力から新しいブレークポイント番号を取り出す
    pub fn created_breakpoint(&self, text: &str) -> Option<BreakpointId> {
        self.breakpoint_created
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
    }

    /// `info program` の出力からプロセス状態を判定する
    pub fn program_status(&self, text: &str) -> ProcessStatus {
        for line in text.lines().map(str::trim) {
            if line.contains("not being run") {
                return ProcessStatus::Stopped;
            }
            if line.starts_with("It stopped") {
                if let Some(caps) = self.stopped_by_signal.captures(line) {
                    return ProcessStatus::Signaled(caps[1].to_string());
                }
                if line.contains("breakpoint") {
                    return ProcessStatus::Breakpoint;
                }
            }
            if line.contains("is running") {
                return ProcessStatus::Running;
            }
        }
        ProcessStatus::Unknown
    }

    /// `info program` の出力がシリアル回線越しのターゲットを示しているか
    pub fn is_remote_program(&self, text: &str) -> bool {
        text.contains("serial line")
    }

    /// `info inferiors` から選択中のインフェリアを取り出す
    pub fn selected_inferior(&self, text: &str) -> Option<InferiorRow> {
        let caps = self.selected_inferior.captures(text)?;
        let pid = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let remote = rest.contains("(remote ") || rest.contains("(extended-remote ");
        let executable = rest
            .split_whitespace()
            .last()
            .filter(|word| word.starts_with('/'))
            .map(str::to_string);

        Some(InferiorRow {
            pid,
            remote,
            executable,
        })
    }

    /// `info files` から実行ファイルのパスを取り出す
    pub fn exec_file(&self, text: &str) -> Option<String> {
        self.symbols_from
            .captures(text)
            .or_else(|| self.exec_file.captures(text))
            .map(|caps| caps[1].to_string())
    }

    /// `info registers` の各行をパースする
    pub fn registers(&self, text: &str) -> Vec<RegisterValue> {
        text.lines()
            .filter_map(|line| {
                let caps = self.register_row.captures(line)?;
                Some(RegisterValue {
                    name: caps[1].to_string(),
                    value: parse_hex_value(&caps[2])?,
                })
            })
            .collect()
    }

    /// `show architecture` からアーキテクチャ名を取り出す
    ///
    /// `"auto" (currently "i386:x86-64")` の場合は実際のアーキテクチャを返します。
    pub fn architecture(&self, text: &str) -> Option<String> {
        self.quoted
            .captures_iter(text)
            .last()
            .map(|caps| caps[1].to_string())
    }
}
