//! 引数文字列のトークン分割

use crate::expr_eval::ExpressionEvaluator;
use crate::{Result, Session};

/// 空白で区切り、引用符で囲まれた部分は1つのトークンとして扱う
///
/// 引用符そのものはトークンに含めません。
pub fn split_argv(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}

/// レジスタ・変数参照を評価値に置き換えるトークナイザ
pub struct ArgvTokenizer<'a> {
    session: &'a mut Session,
}

impl<'a> ArgvTokenizer<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// 文字列をトークンに分割する
    ///
    /// `$` で始まるトークンは評価し、16進数値に置き換えます。
    /// 評価できなかった参照とリテラルはそのまま残ります（`0xdeadbeef` も再整形しません）。
    pub fn tokenize(&mut self, raw: &str) -> Result<Vec<String>> {
        let mut evaluator = ExpressionEvaluator::new(self.session);
        split_argv(raw)
            .into_iter()
            .map(|token| {
                if !token.starts_with('$') {
                    return Ok(token);
                }
                Ok(evaluator.evaluate(&token)?.unwrap_or(token))
            })
            .collect()
    }
}
