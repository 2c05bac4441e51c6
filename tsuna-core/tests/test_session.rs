//! シミュレーションホスト上のセッションに対する結合テスト

use tsuna_core::parse::{is_canonical_hex, parse_address};
use tsuna_core::{ProcessStatus, RegisterError, Session};

/// `ls` を読み込み、mainで停止した状態のセッション
fn started_session() -> Session {
    let mut session = Session::simulated().expect("Failed to create simulated session");
    session.execute("file ls").expect("file failed");
    session.execute("start > /dev/null").expect("start failed");
    session
}

/// 後始末（finish してから kill）
fn teardown(session: &mut Session) {
    session.execute("finish").expect("finish failed");
    session.execute("kill").expect("kill failed");
}

#[test]
fn test_execute() {
    let mut session = started_session();

    assert!(session.execute("info program").unwrap().is_some());
    assert_eq!(session.execute("unknown_command").unwrap(), None);

    teardown(&mut session);
}

#[test]
fn test_execute_redirect() {
    let mut session = started_session();
    assert_eq!(session.execute_redirect("echo x").unwrap().as_deref(), Some("x"));
    teardown(&mut session);
}

#[test]
fn test_evaluate() {
    let mut session = started_session();

    assert_eq!(session.evaluate("1 + 1").unwrap().as_deref(), Some("0x2"));
    assert_eq!(session.evaluate("0x3 * 0x2").unwrap().as_deref(), Some("0x6"));

    session.execute("set $eax=0x10").unwrap();
    assert_eq!(session.evaluate("$eax").unwrap().as_deref(), Some("0x10"));

    // 不正な式は値なし
    assert_eq!(session.evaluate("1 +* 2").unwrap(), None);

    teardown(&mut session);
}

#[test]
fn test_evaluate_is_always_canonical() {
    let mut session = started_session();
    for expr in ["0", "1", "0x0010", "255", "$rip", "$rsp - 8", "-1"] {
        let value = session
            .evaluate(expr)
            .unwrap()
            .unwrap_or_else(|| panic!("No value for {}", expr));
        assert!(is_canonical_hex(&value), "{} -> {}", expr, value);
    }
    teardown(&mut session);
}

#[test]
fn test_tokenize() {
    let mut session = started_session();

    assert_eq!(session.tokenize("1 2 3").unwrap(), vec!["1", "2", "3"]);

    session.execute("set $eax=1").unwrap();
    assert_eq!(session.tokenize("$eax 1").unwrap(), vec!["0x1", "1"]);
    assert_eq!(
        session.tokenize(r#""a b" $eax"#).unwrap(),
        vec!["a b", "0x1"]
    );
    assert_eq!(
        session.tokenize("0xdeadbeef 0x1").unwrap(),
        vec!["0xdeadbeef", "0x1"]
    );

    teardown(&mut session);
}

#[test]
fn test_get_register() {
    let mut session = started_session();

    session.execute("set $eax=1337").unwrap();
    assert_eq!(session.registers().get_register("eax").unwrap(), 1337);
    assert_eq!(session.registers().get_register("Eax").unwrap(), 1337);

    session.execute("set $al=13").unwrap();
    assert_eq!(
        session.registers().get_register("eax").unwrap(),
        (1337 & 0xFF00) + 13
    );

    teardown(&mut session);
}

#[test]
fn test_low_byte_write_keeps_parent_bits() {
    let mut session = started_session();

    for old in [0u64, 0x1234_5678, 0xffff_ffff] {
        for byte in [0u64, 0x7f, 0xff] {
            let mut regs = session.registers();
            regs.set_register("eax", old).unwrap();
            regs.set_register("al", byte).unwrap();
            assert_eq!(
                regs.get_register("eax").unwrap(),
                (old & 0xFFFF_FF00) | byte
            );
        }
    }

    teardown(&mut session);
}

#[test]
fn test_unknown_register_is_not_zero() {
    let mut session = started_session();
    let result = session.registers().get_register("bogus");
    assert!(matches!(result, Err(RegisterError::Unknown(_))));
    teardown(&mut session);
}

#[test]
fn test_variables_and_expressions_are_not_registers() {
    let mut session = started_session();

    session.execute("set $foo=5").unwrap();
    assert!(matches!(
        session.registers().get_register("foo"),
        Err(RegisterError::Unknown(_))
    ));

    session.execute("print 7").unwrap();
    assert!(matches!(
        session.registers().get_register("1"),
        Err(RegisterError::Unknown(_))
    ));

    assert!(matches!(
        session.registers().get_register("eax+1"),
        Err(RegisterError::Unknown(_))
    ));

    teardown(&mut session);
}

#[test]
fn test_get_status() {
    let mut session = started_session();

    session.execute("finish").unwrap();
    session.execute("kill").unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Stopped);

    session.execute("file /usr/bin/ls").unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Stopped);

    session.execute("start > /dev/null").unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Breakpoint);

    session.execute("set $pc=0x0").unwrap();
    session.execute("continue >/dev/null").unwrap();
    let status = session.status().unwrap();
    assert_eq!(status, ProcessStatus::Signaled("SIGSEGV".to_string()));
    assert_eq!(status.to_string(), "SIGSEGV");

    session.execute("finish").unwrap();
    session.execute("kill").unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Stopped);
}

#[test]
fn test_status_at_explicit_breakpoint() {
    let mut session = started_session();
    session.breakpoints().set_breakpoint(0x5555_5555_9000).unwrap();
    session.execute("continue").unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Breakpoint);
    assert_eq!(
        session.registers().get_register("rip").unwrap(),
        0x5555_5555_9000
    );
    teardown(&mut session);
}

#[test]
fn test_getpid() {
    let mut session = started_session();

    let pid = session.target().get_pid().unwrap();
    session.execute("call getpid()").unwrap();
    let printed = session.execute_redirect("print $").unwrap().unwrap();
    let expected: i32 = printed
        .split('=')
        .nth(1)
        .and_then(|v| v.trim().parse().ok())
        .expect("Failed to parse print output");
    assert_eq!(pid, Some(expected));

    teardown(&mut session);
    assert_eq!(session.target().get_pid().unwrap(), None);
}

#[test]
fn test_is_target_remote() {
    let mut session = started_session();
    assert!(!session.target().is_target_remote().unwrap());
    teardown(&mut session);

    session.execute("target remote localhost:1234").unwrap();
    assert!(session.target().is_target_remote().unwrap());
    session.execute("detach").unwrap();
    assert!(!session.target().is_target_remote().unwrap());
}

#[test]
fn test_getfile() {
    let mut session = started_session();
    session.execute("file /usr/bin/ls").unwrap();
    assert_eq!(session.target().get_file().unwrap(), "/usr/bin/ls");
    teardown(&mut session);
}

#[test]
fn test_breakpoint() {
    let mut session = started_session();

    let mut bps = session.breakpoints();
    bps.set_breakpoint(0x1337).unwrap();
    bps.set_breakpoint(0xdeadbeef).unwrap();
    let snapshot = bps.get_breakpoints().unwrap();
    assert_eq!(snapshot.len(), 2);

    session.execute("delete").unwrap();
    assert_eq!(snapshot[0].address, Some(0x1337));
    assert_eq!(snapshot[1].address, Some(0xdeadbeef));
    assert!(session.breakpoints().get_breakpoints().unwrap().is_empty());

    teardown(&mut session);
}

#[test]
fn test_breakpoint_clear_all_and_order() {
    let mut session = Session::simulated().unwrap();
    let addresses = [0x4000u64, 0x1000, 0x3000, 0x2000];

    let mut bps = session.breakpoints();
    for address in addresses {
        bps.set_breakpoint(address).unwrap();
    }
    // 同じアドレスへの再設定は何もしない
    assert_eq!(bps.set_breakpoint(0x1000).unwrap(), None);

    let table = bps.get_breakpoints().unwrap();
    let got: Vec<u64> = table.iter().filter_map(|bp| bp.address).collect();
    assert_eq!(got, addresses);

    bps.clear_all().unwrap();
    assert_eq!(bps.count().unwrap(), 0);
    assert_eq!(table.len(), addresses.len());
}

#[test]
fn test_no_process_queries_are_not_errors() {
    let mut session = Session::simulated().unwrap();
    assert_eq!(session.status().unwrap(), ProcessStatus::Stopped);
    assert_eq!(session.target().get_pid().unwrap(), None);
    assert_eq!(session.target().get_file().unwrap(), "");
    assert!(session.breakpoints().get_breakpoints().unwrap().is_empty());
    assert!(session.registers().get_registers().unwrap().is_empty());
}

#[test]
fn test_registers_table_matches_single_reads() {
    let mut session = started_session();
    let all = session.registers().get_registers().unwrap();
    assert!(!all.is_empty());
    for reg in all.iter().take(4) {
        assert_eq!(
            session.registers().get_register(&reg.name).unwrap(),
            reg.value
        );
    }
    // 16進数表記の値はそのまま解釈できる
    let rip = session.evaluate("$rip").unwrap().unwrap();
    assert_eq!(parse_address(&rip).unwrap(), 0x5555_5555_8b40);
    teardown(&mut session);
}
