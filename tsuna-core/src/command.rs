//! REPLコマンド
//!
//! どのコマンドにも一致しない入力は、そのままディレクティブとしてホストに送ります。

use crate::breakpoint::BreakpointId;

/// REPLコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 式を評価して16進数で表示
    Eval(String),
    /// 引数文字列をトークン分割して表示
    Argv(String),
    /// レジスタの値を表示
    Reg(String),
    /// 汎用レジスタをすべて表示
    Regs,
    /// レジスタに値を書き込む（名前、値の式）
    SetReg(String, String),
    /// プロセス状態を表示
    Status,
    /// ブレークポイントを設定（アドレスの式）
    Break(String),
    /// 一時ブレークポイントを設定
    TempBreak(String),
    /// ブレークポイント一覧を表示
    Breakpoints,
    /// ブレークポイントを削除（Noneならすべて）
    Delete(Option<BreakpointId>),
    /// ブレークポイントを有効化
    Enable(BreakpointId),
    /// ブレークポイントを無効化
    Disable(BreakpointId),
    /// ターゲット情報を表示
    Meta,
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
    /// ホストへそのまま送るディレクティブ
    Raw(String),
}

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 空行と引数の足りないコマンドはNone。
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (head, rest) = input
            .split_once(char::is_whitespace)
            .map(|(h, r)| (h, r.trim()))
            .unwrap_or((input, ""));

        match head {
            "" => None,
            "eval" | "e" => non_empty(rest).map(Command::Eval),
            "argv" => Some(Command::Argv(rest.to_string())),
            "reg" => non_empty(rest).map(Command::Reg),
            "regs" => Some(Command::Regs),
            "setreg" => {
                let (name, value) = rest.split_once(char::is_whitespace)?;
                Some(Command::SetReg(name.to_string(), non_empty(value.trim())?))
            }
            "status" => Some(Command::Status),
            "bp" => non_empty(rest).map(Command::Break),
            "tbp" => non_empty(rest).map(Command::TempBreak),
            "bps" => Some(Command::Breakpoints),
            "bpdel" => {
                if rest.is_empty() {
                    Some(Command::Delete(None))
                } else {
                    rest.parse().ok().map(|id| Command::Delete(Some(id)))
                }
            }
            "bpon" => rest.parse().ok().map(Command::Enable),
            "bpoff" => rest.parse().ok().map(Command::Disable),
            "meta" => Some(Command::Meta),
            "help" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => Some(Command::Raw(input.to_string())),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("eval 1 + 1"), Some(Command::Eval("1 + 1".to_string())));
        assert_eq!(Command::parse("e $eax"), Some(Command::Eval("$eax".to_string())));
        assert_eq!(Command::parse("reg Eax"), Some(Command::Reg("Eax".to_string())));
        assert_eq!(
            Command::parse("setreg al 13"),
            Some(Command::SetReg("al".to_string(), "13".to_string()))
        );
        assert_eq!(Command::parse("status"), Some(Command::Status));
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("?"), Some(Command::Help));
    }

    #[test]
    fn test_parse_breakpoint_commands() {
        assert_eq!(Command::parse("bp 0x1337"), Some(Command::Break("0x1337".to_string())));
        assert_eq!(Command::parse("bpdel"), Some(Command::Delete(None)));
        assert_eq!(Command::parse("bpdel 2"), Some(Command::Delete(Some(2))));
        assert_eq!(Command::parse("bpoff 3"), Some(Command::Disable(3)));
        assert_eq!(Command::parse("bpdel x"), None);
        assert_eq!(Command::parse("bp"), None);
    }

    #[test]
    fn test_unmatched_input_is_raw() {
        assert_eq!(
            Command::parse("  info registers rip "),
            Some(Command::Raw("info registers rip".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }
}
