//! GDB/MI出力レコードのパーサ
//!
//! MIの出力は1行1レコードで、先頭の記号で種類が決まります。
//!
//! - `^done` / `^running` / `^error,msg="..."` などの結果レコード
//! - `*stopped,...` などの非同期レコード
//! - `~"..."`（コンソール）、`@"..."`（ターゲット）、`&"..."`（ログ）のストリームレコード
//! - `(gdb)` プロンプト

use crate::channel::HostError;
use crate::Result;

/// 結果レコードのクラス
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error(String),
    Exit,
}

/// ストリームレコードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Console,
    Target,
    Log,
}

/// 非同期レコードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` 実行状態の変化
    Exec,
    /// `+` 進捗
    Status,
    /// `=` 通知
    Notify,
}

/// MI出力の1レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Result(ResultClass),
    Async {
        kind: AsyncKind,
        class: String,
        body: String,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    Prompt,
    /// MI形式でない行（インフェリアの出力など）
    Other(String),
}

/// MIの1行をパースする
pub fn parse_line(line: &str) -> Result<Record> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim_end() == "(gdb)" {
        return Ok(Record::Prompt);
    }

    // 先頭のトークン（数字列）は読み飛ばす
    let body = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut chars = body.chars();
    let Some(marker) = chars.next() else {
        return Ok(Record::Other(line.to_string()));
    };
    let rest = chars.as_str();

    match marker {
        '^' => parse_result(rest).map(Record::Result),
        '*' | '+' | '=' => {
            let kind = match marker {
                '*' => AsyncKind::Exec,
                '+' => AsyncKind::Status,
                _ => AsyncKind::Notify,
            };
            let (class, body) = rest.split_once(',').unwrap_or((rest, ""));
            Ok(Record::Async {
                kind,
                class: class.to_string(),
                body: body.to_string(),
            })
        }
        '~' | '@' | '&' if rest.starts_with('"') => {
            let kind = match marker {
                '~' => StreamKind::Console,
                '@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let (text, _) = parse_cstring(rest)
                .ok_or_else(|| HostError::Protocol(line.to_string()))?;
            Ok(Record::Stream { kind, text })
        }
        _ => Ok(Record::Other(line.to_string())),
    }
}

/// 結果レコード（`^`以降）をパースする
fn parse_result(rest: &str) -> Result<ResultClass> {
    let (class, results) = rest.split_once(',').unwrap_or((rest, ""));
    match class {
        "done" => Ok(ResultClass::Done),
        "running" => Ok(ResultClass::Running),
        "connected" => Ok(ResultClass::Connected),
        "exit" => Ok(ResultClass::Exit),
        "error" => {
            let msg = find_field(results, "msg").unwrap_or_default();
            Ok(ResultClass::Error(msg))
        }
        _ => Err(HostError::Protocol(format!("^{}", rest)).into()),
    }
}

/// `name="value"` 形式の結果リストからフィールドを取り出す
pub fn find_field(results: &str, name: &str) -> Option<String> {
    let key = format!("{}=", name);
    let mut search = results;
    loop {
        let pos = search.find(&key)?;
        let at_boundary = pos == 0
            || matches!(search.as_bytes()[pos - 1], b',' | b'{' | b'[');
        let after = &search[pos + key.len()..];
        if at_boundary && after.starts_with('"') {
            return parse_cstring(after).map(|(value, _)| value);
        }
        search = after;
    }
}

/// MIのC文字列リテラルをデコードし、残りの入力とともに返す
///
/// 入力は `"` で始まっている必要があります。
pub fn parse_cstring(input: &str) -> Option<(String, &str)> {
    let mut chars = input.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }

    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &input[i + 1..])),
            '\\' => {
                let (_, esc) = chars.next()?;
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'e' => out.push('\x1b'),
                    'a' => out.push('\x07'),
                    '0'..='7' => {
                        // 8進エスケープ（最大3桁）
                        let mut value = esc.to_digit(8)?;
                        for _ in 0..2 {
                            let next = chars.clone().next();
                            match next {
                                Some((_, d)) if d.is_digit(8) => {
                                    value = value * 8 + d.to_digit(8)?;
                                    chars.next();
                                }
                                _ => break,
                            }
                        }
                        out.push(char::from_u32(value)?);
                    }
                    other => out.push(other),
                }
            }
            _ => out.push(c),
        }
    }
    None
}

/// コンソールコマンドを`-interpreter-exec`でラップする
pub fn console_command(directive: &str) -> String {
    let mut escaped = String::with_capacity(directive.len() + 2);
    for c in directive.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    format!("-interpreter-exec console \"{}\"", escaped)
}
