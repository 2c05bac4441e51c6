//! プロセス状態の判定
//!
//! 状態はキャッシュせず、問い合わせのたびに `info program` から導出します。

use crate::target::TargetInfo;
use crate::{Result, Session};
use nix::sys::signal::Signal;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// プロセスの実行状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// プロセスが存在しない（未起動、終了、kill済み）
    Stopped,
    /// エントリポイントまたはブレークポイントで停止中
    Breakpoint,
    /// シグナルを受けて停止中（例: `SIGSEGV`）
    Signaled(String),
    /// 実行中
    Running,
    /// プロセスは存在するが停止理由を分類できない（ステップ実行後など）
    Unknown,
}

impl ProcessStatus {
    /// シグナルで停止している場合、そのシグナルを取得する
    ///
    /// ホストOSが知らないシグナル名の場合はNone。
    pub fn signal(&self) -> Option<Signal> {
        match self {
            ProcessStatus::Signaled(name) => Signal::from_str(name).ok(),
            _ => None,
        }
    }

    /// プロセスが存在するかどうか
    pub fn is_alive(&self) -> bool {
        !matches!(self, ProcessStatus::Stopped)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Stopped => write!(f, "STOPPED"),
            ProcessStatus::Breakpoint => write!(f, "BREAKPOINT"),
            ProcessStatus::Signaled(name) => write!(f, "{}", name),
            ProcessStatus::Running => write!(f, "RUNNING"),
            ProcessStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// プロセス状態の判定器
pub struct StatusTracker<'a> {
    session: &'a mut Session,
}

impl<'a> StatusTracker<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// 現在のプロセス状態を取得する
    pub fn get_status(&mut self) -> Result<ProcessStatus> {
        if let Some(text) = self.session.execute_redirect("info program")? {
            return Ok(self.session.parser().program_status(&text));
        }

        // 実行中のスレッドに対しては `info program` 自体が失敗する
        let pid = TargetInfo::new(self.session).get_pid()?;
        debug!("info program failed, pid = {:?}", pid);
        Ok(match pid {
            Some(_) => ProcessStatus::Running,
            None => ProcessStatus::Stopped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProcessStatus::Stopped.to_string(), "STOPPED");
        assert_eq!(ProcessStatus::Breakpoint.to_string(), "BREAKPOINT");
        assert_eq!(
            ProcessStatus::Signaled("SIGSEGV".to_string()).to_string(),
            "SIGSEGV"
        );
        assert_eq!(ProcessStatus::Running.to_string(), "RUNNING");
    }

    #[test]
    fn test_signal() {
        assert_eq!(
            ProcessStatus::Signaled("SIGSEGV".to_string()).signal(),
            Some(Signal::SIGSEGV)
        );
        assert_eq!(ProcessStatus::Signaled("SIGFOO".to_string()).signal(), None);
        assert_eq!(ProcessStatus::Breakpoint.signal(), None);
    }

    #[test]
    fn test_running_in_background() {
        let mut session = Session::simulated().unwrap();
        session.execute("file /usr/bin/ls").unwrap();
        session.execute("start").unwrap();
        session.execute("continue &").unwrap();
        assert_eq!(session.status().unwrap(), ProcessStatus::Running);

        session.execute("interrupt").unwrap();
        let status = session.status().unwrap();
        assert_eq!(status, ProcessStatus::Signaled("SIGINT".to_string()));
        assert_eq!(status.signal(), Some(Signal::SIGINT));
    }

    #[test]
    fn test_stepped_is_unknown() {
        let mut session = Session::simulated().unwrap();
        session.execute("file /usr/bin/ls").unwrap();
        session.execute("start").unwrap();
        session.execute("finish").unwrap();
        let status = session.status().unwrap();
        assert_eq!(status, ProcessStatus::Unknown);
        assert!(status.is_alive());
    }
}
