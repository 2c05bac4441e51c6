//! ブレークポイント管理
//!
//! ブレークポイントの状態はホスト側にだけ存在します。
//! 取得したレコードはその時点のスナップショットで、後の変更の影響を受けません。

use crate::errors::ERR_BREAKPOINT_NOT_FOUND;
use crate::parse::to_canonical_hex;
use crate::{Result, Session};
use tracing::debug;

/// ブレークポイント番号（ホストが割り当てる）
pub type BreakpointId = u32;

/// ブレークポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: BreakpointId,
    /// 種類（`breakpoint`、`hw watchpoint` など）
    pub kind: String,
    /// ヒット後に削除される一時ブレークポイントか
    pub temporary: bool,
    pub enabled: bool,
    /// アドレス（ウォッチポイントなどアドレスを持たないものはNone）
    pub address: Option<u64>,
    /// 位置の説明（`<main+4>` など）
    pub what: String,
    /// ヒット回数
    pub hits: u32,
}

/// ブレークポイントマネージャ
pub struct BreakpointManager<'a> {
    session: &'a mut Session,
}

impl<'a> BreakpointManager<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// アドレスにブレークポイントを設定する
    ///
    /// 同じアドレスにすでにブレークポイントがある場合は何もせずNoneを返します。
    pub fn set_breakpoint(&mut self, address: u64) -> Result<Option<BreakpointId>> {
        self.insert("break", address)
    }

    /// アドレスに一時ブレークポイントを設定する
    pub fn set_temporary_breakpoint(&mut self, address: u64) -> Result<Option<BreakpointId>> {
        self.insert("tbreak", address)
    }

    fn insert(&mut self, command: &str, address: u64) -> Result<Option<BreakpointId>> {
        if self
            .get_breakpoints()?
            .iter()
            .any(|bp| bp.address == Some(address))
        {
            debug!("Breakpoint already exists at {:#x}", address);
            return Ok(None);
        }

        let directive = format!("{} *{}", command, to_canonical_hex(address));
        let output = self
            .session
            .execute_redirect(&directive)?
            .ok_or_else(|| anyhow::anyhow!("Failed to set breakpoint at {:#x}", address))?;

        Ok(self.session.parser().created_breakpoint(&output))
    }

    /// すべてのブレークポイントを挿入順に取得する
    pub fn get_breakpoints(&mut self) -> Result<Vec<Breakpoint>> {
        let Some(text) = self.session.execute_redirect("info breakpoints")? else {
            return Ok(Vec::new());
        };
        Ok(self.session.parser().breakpoints(&text))
    }

    /// 番号を指定してブレークポイントを取得する
    pub fn get_breakpoint(&mut self, id: BreakpointId) -> Result<Option<Breakpoint>> {
        Ok(self.get_breakpoints()?.into_iter().find(|bp| bp.id == id))
    }

    /// ブレークポイントの数を取得する
    pub fn count(&mut self) -> Result<usize> {
        Ok(self.get_breakpoints()?.len())
    }

    /// ブレークポイントを削除する
    pub fn delete_breakpoint(&mut self, id: BreakpointId) -> Result<()> {
        self.apply("delete", id)
    }

    /// ブレークポイントを有効化する
    pub fn enable_breakpoint(&mut self, id: BreakpointId) -> Result<()> {
        self.apply("enable", id)
    }

    /// ブレークポイントを無効化する
    pub fn disable_breakpoint(&mut self, id: BreakpointId) -> Result<()> {
        self.apply("disable", id)
    }

    fn apply(&mut self, command: &str, id: BreakpointId) -> Result<()> {
        self.session
            .execute_redirect(&format!("{} {}", command, id))?
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_BREAKPOINT_NOT_FOUND, id))
    }

    /// すべてのブレークポイントを削除する
    pub fn clear_all(&mut self) -> Result<()> {
        self.session
            .execute_redirect("delete")?
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("Failed to delete breakpoints"))
    }
}
