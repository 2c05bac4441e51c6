//! 式評価
//!
//! ホストの式言語で式を評価し、結果を正規形の16進数文字列（`0x2`、`0x10`）で返します。
//! 算術式とレジスタ参照（`$eax`）は同じ経路で評価されます。

use crate::errors::ERR_NO_VALUE;
use crate::parse::{parse_hex_value, to_canonical_hex};
use crate::{Result, Session};
use tracing::trace;

/// 式評価器
pub struct ExpressionEvaluator<'a> {
    session: &'a mut Session,
}

impl<'a> ExpressionEvaluator<'a> {
    /// 新しい式評価器を作成する
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// 式を評価する
    ///
    /// 評価に失敗した場合や整数値にならない場合（`void`、構造体など）はNone。
    /// 値履歴に残らないよう `output/x` を使います。
    pub fn evaluate(&mut self, expr: &str) -> Result<Option<String>> {
        Ok(self.evaluate_u64(expr)?.map(to_canonical_hex))
    }

    /// 式を評価して整数値を取得する
    pub fn evaluate_u64(&mut self, expr: &str) -> Result<Option<u64>> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(None);
        }

        let output = self
            .session
            .execute_redirect(&format!("output/x {}", expr))?;
        trace!("output/x {} -> {:?}", expr, output);
        Ok(output.as_deref().and_then(parse_hex_value))
    }

    /// 式を評価し、値がなければエラーにする
    pub fn require_u64(&mut self, expr: &str) -> Result<u64> {
        self.evaluate_u64(expr)?
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_NO_VALUE, expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_is_canonical_hex() {
        let mut session = Session::simulated().unwrap();
        let mut eval = ExpressionEvaluator::new(&mut session);
        assert_eq!(eval.evaluate("1 + 1").unwrap().as_deref(), Some("0x2"));
        assert_eq!(eval.evaluate("0x3 * 0x2").unwrap().as_deref(), Some("0x6"));
        assert_eq!(eval.evaluate("16").unwrap().as_deref(), Some("0x10"));
        assert_eq!(eval.evaluate("0").unwrap().as_deref(), Some("0x0"));
    }

    #[test]
    fn test_malformed_expression_has_no_value() {
        let mut session = Session::simulated().unwrap();
        let mut eval = ExpressionEvaluator::new(&mut session);
        assert_eq!(eval.evaluate("1 +").unwrap(), None);
        assert_eq!(eval.evaluate("").unwrap(), None);
        assert_eq!(eval.evaluate("$unset").unwrap(), None);
        assert!(eval.require_u64("$unset").is_err());
    }

    #[test]
    fn test_convenience_variable() {
        let mut session = Session::simulated().unwrap();
        session.execute("set $foo = 0xdeadbeef").unwrap();
        assert_eq!(
            session.evaluate("$foo").unwrap().as_deref(),
            Some("0xdeadbeef")
        );
    }
}
