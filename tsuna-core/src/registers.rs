//! レジスタアクセス
//!
//! 値はキャッシュせず、毎回セッションに問い合わせます。
//! サブレジスタ（`al`、`ax`、`eax`など）への書き込みは親レジスタの該当ビットだけを変更します。

use crate::errors::RegisterError;
use crate::expr_eval::ExpressionEvaluator;
use crate::parse::to_canonical_hex;
use crate::Session;
use tracing::debug;
use tsuna_host::regs;

type RegResult<T> = std::result::Result<T, RegisterError>;

/// レジスタ名と値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    pub name: String,
    pub value: u64,
}

/// レジスタアクセス
pub struct Registers<'a> {
    session: &'a mut Session,
}

/// レジスタ名として使える文字だけで構成されているか（`[a-z0-9_]+`）
fn is_register_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// レジスタ名を正規化する（前後の空白と先頭の`$`を除き、小文字にする）
fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('$').to_ascii_lowercase()
}

impl<'a> Registers<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// レジスタの値を取得する（大文字小文字を区別しない）
    ///
    /// 名前はレジスタ表か `info registers NAME` で確認してから評価するので、
    /// コンビニエンス変数・値履歴・式はレジスタとして扱われません。
    /// ホストが値を返さないサブレジスタは、親レジスタを読んでビット範囲を取り出します。
    pub fn get_register(&mut self, name: &str) -> RegResult<u64> {
        let name = normalize(name);
        if !is_register_name(&name) {
            return Err(RegisterError::Unknown(name));
        }

        let spec = regs::lookup(&name);
        if spec.is_none() {
            // 表にないレジスタは、ホストが名前を知っているかどうかで区別する
            let known = self
                .session
                .execute_redirect(&format!("info registers {}", name))?
                .is_some();
            if !known {
                return Err(RegisterError::Unknown(name));
            }
        }

        let mut evaluator = ExpressionEvaluator::new(self.session);
        if let Some(value) = evaluator.evaluate_u64(&format!("${}", name))? {
            // 符号付きの型で表示されたサブレジスタは幅に合わせて切り詰める
            return Ok(spec.map_or(value, |spec| value & spec.mask()));
        }

        if let Some(spec) = spec.filter(|spec| spec.parent.is_some()) {
            let root = spec.root();
            if let Some(value) = evaluator.evaluate_u64(&format!("${}", root.name))? {
                debug!("Read {} through {}", spec.name, root.name);
                return Ok(spec.extract(value));
            }
        }
        Err(RegisterError::Unavailable(name))
    }

    /// レジスタに値を書き込む
    ///
    /// サブレジスタへの書き込みは親レジスタの他のビットを変更しません。
    pub fn set_register(&mut self, name: &str, value: u64) -> RegResult<()> {
        let name = normalize(name);
        let spec = regs::lookup(&name).ok_or_else(|| RegisterError::Unknown(name.clone()))?;

        let directive = format!(
            "set ${}={}",
            spec.name,
            to_canonical_hex(value & spec.mask())
        );
        match self.session.execute_redirect(&directive)? {
            Some(_) => Ok(()),
            None => Err(RegisterError::Unavailable(name)),
        }
    }

    /// 汎用レジスタをすべて取得する（`info registers` の表示順）
    ///
    /// プロセスがない場合は空になります。
    pub fn get_registers(&mut self) -> crate::Result<Vec<RegisterValue>> {
        let Some(text) = self.session.execute_redirect("info registers")? else {
            return Ok(Vec::new());
        };
        Ok(self.session.parser().registers(&text))
    }
}
