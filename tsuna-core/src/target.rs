//! ターゲット情報（実行ファイル、プロセスID、リモート接続、アーキテクチャ）

use crate::{Result, Session};

/// ターゲット情報アクセス
pub struct TargetInfo<'a> {
    session: &'a mut Session,
}

impl<'a> TargetInfo<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// 読み込まれている実行ファイルのパスを取得する（なければ空文字列）
    pub fn get_file(&mut self) -> Result<String> {
        if let Some(text) = self.session.execute_redirect("info files")? {
            if let Some(path) = self.session.parser().exec_file(&text) {
                return Ok(path);
            }
        }

        let Some(text) = self.session.execute_redirect("info inferiors")? else {
            return Ok(String::new());
        };
        Ok(self
            .session
            .parser()
            .selected_inferior(&text)
            .and_then(|row| row.executable)
            .unwrap_or_default())
    }

    /// デバッグ対象のプロセスIDを取得する（プロセスがなければNone）
    pub fn get_pid(&mut self) -> Result<Option<i32>> {
        let Some(text) = self.session.execute_redirect("info inferiors")? else {
            return Ok(None);
        };
        Ok(self
            .session
            .parser()
            .selected_inferior(&text)
            .and_then(|row| row.pid))
    }

    /// リモート接続（`target remote`）でデバッグしているかどうか
    pub fn is_target_remote(&mut self) -> Result<bool> {
        if let Some(text) = self.session.execute_redirect("info program")? {
            if self.session.parser().is_remote_program(&text) {
                return Ok(true);
            }
        }

        // 実行中は `info program` が使えないので接続種別から判定する
        let Some(text) = self.session.execute_redirect("info inferiors")? else {
            return Ok(false);
        };
        Ok(self
            .session
            .parser()
            .selected_inferior(&text)
            .is_some_and(|row| row.remote))
    }

    /// ターゲットのアーキテクチャ名を取得する（例: `i386:x86-64`）
    pub fn get_arch(&mut self) -> Result<Option<String>> {
        let Some(text) = self.session.execute_redirect("show architecture")? else {
            return Ok(None);
        };
        Ok(self.session.parser().architecture(&text))
    }

    /// ポインタ幅（バイト数）
    pub fn int_size(&mut self) -> Result<usize> {
        let arch = self.get_arch()?.unwrap_or_default();
        Ok(if arch.contains("64") { 8 } else { 4 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_file_no_pid() {
        let mut session = Session::simulated().unwrap();
        let mut target = session.target();
        assert_eq!(target.get_file().unwrap(), "");
        assert_eq!(target.get_pid().unwrap(), None);
        assert!(!target.is_target_remote().unwrap());
    }

    #[test]
    fn test_arch() {
        let mut session = Session::simulated().unwrap();
        let mut target = session.target();
        assert_eq!(target.get_arch().unwrap().as_deref(), Some("i386:x86-64"));
        assert_eq!(target.int_size().unwrap(), 8);
    }

    #[test]
    fn test_remote() {
        let mut session = Session::simulated().unwrap();
        session.execute("file /usr/bin/ls").unwrap();
        session.execute("target remote localhost:1234").unwrap();
        assert!(session.target().is_target_remote().unwrap());
        assert!(session.target().get_pid().unwrap().is_some());

        session.execute("continue &").unwrap();
        assert!(session.target().is_target_remote().unwrap());
    }
}
