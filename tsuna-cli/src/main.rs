//! Tsuna CLI - コマンドラインインターフェース
//!
//! GDBセッションを自動化レイヤー越しに操作するREPL

use anyhow::Result;
use clap::{ArgAction, Parser};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tsuna_core::errors::ERR_INVALID_ADDRESS;
use tsuna_core::parse::{parse_address, to_canonical_hex};
use tsuna_core::{Command, GdbConfig, Session, SessionOptions, SimHost};

/// Tsuna - debugger automation shell
#[derive(Parser)]
#[command(name = "tsuna")]
#[command(version = "0.1.0")]
#[command(about = "Typed automation layer over a GDB session", long_about = None)]
struct Cli {
    /// Path to the gdb executable
    #[arg(long, default_value = "gdb")]
    gdb: PathBuf,

    /// Use the built-in simulated host instead of gdb
    #[arg(long)]
    sim: bool,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Run a command non-interactively (repeatable)
    #[arg(short = 'x', long = "exec", value_name = "DIRECTIVE")]
    exec: Vec<String>,

    /// Executable to load
    file: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut session = init_session(&cli)?;

    if !cli.exec.is_empty() {
        for line in &cli.exec {
            if !handle_command(&mut session, line)? {
                break;
            }
        }
        return Ok(());
    }

    println!("Tsuna - debugger automation shell");
    println!("Version 0.1.0");
    println!();

    run_repl(&mut session)
}

/// ログ出力を初期化する
///
/// `-v` が指定されていればその段階を、なければ `RUST_LOG`（既定は `warn`）を使います。
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// セッションを作成し、実行ファイルを読み込む
fn init_session(cli: &Cli) -> Result<Session> {
    let options = SessionOptions { echo: true };

    let mut session = if cli.sim {
        info!("Using simulated host");
        Session::with_options(Box::new(SimHost::new()), options)?
    } else {
        let config = GdbConfig {
            gdb_path: cli.gdb.clone(),
            ..GdbConfig::default()
        };
        Session::spawn_gdb_with_options(&config, options)?
    };

    if let Some(file) = &cli.file {
        info!("Loading {}", file);
        session.execute(&format!("file {}", file))?;
    }

    Ok(session)
}

/// 履歴ファイルのパス
fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|dir| dir.join(".tsuna_history"))
}

/// REPLループを実行する
fn run_repl(session: &mut Session) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        if rl.load_history(path).is_err() {
            debug!("No history at {}", path.display());
        }
    }

    loop {
        let readline = rl.readline("(tsuna) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        if !session.is_alive() {
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            debug!("Failed to save history: {}", e);
        }
    }

    Ok(())
}

/// 1行のコマンドを処理する（falseなら終了）
fn handle_command(session: &mut Session, line: &str) -> Result<bool> {
    let Some(command) = Command::parse(line) else {
        return Ok(true);
    };

    match command {
        Command::Help => print_help(),
        Command::Quit => {
            println!("Goodbye!");
            return Ok(false);
        }
        Command::Eval(expr) => match session.evaluate(&expr)? {
            Some(value) => println!("{}", value),
            None => println!("(unavailable)"),
        },
        Command::Argv(raw) => println!("{:?}", session.tokenize(&raw)?),
        Command::Reg(name) => {
            let value = session.registers().get_register(&name)?;
            println!("{} = {}", name, to_canonical_hex(value));
        }
        Command::Regs => {
            for reg in session.registers().get_registers()? {
                println!("{:<10} {}", reg.name, to_canonical_hex(reg.value));
            }
        }
        Command::SetReg(name, expr) => {
            let value = resolve_value(session, &expr)?;
            session.registers().set_register(&name, value)?;
        }
        Command::Status => println!("{}", session.status()?),
        Command::Break(expr) => handle_break(session, &expr, false)?,
        Command::TempBreak(expr) => handle_break(session, &expr, true)?,
        Command::Breakpoints => handle_breakpoints(session)?,
        Command::Delete(Some(id)) => session.breakpoints().delete_breakpoint(id)?,
        Command::Delete(None) => session.breakpoints().clear_all()?,
        Command::Enable(id) => session.breakpoints().enable_breakpoint(id)?,
        Command::Disable(id) => session.breakpoints().disable_breakpoint(id)?,
        Command::Meta => handle_meta(session)?,
        Command::Raw(directive) => {
            session.execute(&directive)?;
        }
    }

    Ok(true)
}

/// 数値リテラルとして解釈できなければ式として評価する
fn resolve_value(session: &mut Session, expr: &str) -> Result<u64> {
    if let Ok(value) = parse_address(expr) {
        return Ok(value);
    }
    session
        .evaluate(expr)?
        .and_then(|hex| parse_address(&hex).ok())
        .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_INVALID_ADDRESS, expr))
}

/// Break / TempBreakコマンドを処理する
fn handle_break(session: &mut Session, expr: &str, temporary: bool) -> Result<()> {
    let address = resolve_value(session, expr)?;
    let mut breakpoints = session.breakpoints();
    let created = if temporary {
        breakpoints.set_temporary_breakpoint(address)?
    } else {
        breakpoints.set_breakpoint(address)?
    };

    match created {
        Some(id) => println!("Breakpoint {} set at {}", id, to_canonical_hex(address)),
        None => println!("Breakpoint already set at {}", to_canonical_hex(address)),
    }
    Ok(())
}

/// Breakpointsコマンドを処理する
fn handle_breakpoints(session: &mut Session) -> Result<()> {
    let breakpoints = session.breakpoints().get_breakpoints()?;
    if breakpoints.is_empty() {
        println!("No breakpoints");
        return Ok(());
    }

    for bp in breakpoints {
        let address = bp
            .address
            .map(to_canonical_hex)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}. {} {} {}{} hits={} {}",
            bp.id,
            bp.kind,
            address,
            if bp.enabled { "enabled" } else { "disabled" },
            if bp.temporary { " (temporary)" } else { "" },
            bp.hits,
            bp.what
        );
    }
    Ok(())
}

/// Metaコマンドを処理する
fn handle_meta(session: &mut Session) -> Result<()> {
    let mut target = session.target();
    let file = target.get_file()?;
    let pid = target.get_pid()?;
    let remote = target.is_target_remote()?;
    let arch = target.get_arch()?;

    println!("file:   {}", if file.is_empty() { "(none)" } else { file.as_str() });
    match pid {
        Some(pid) => println!("pid:    {}", pid),
        None => println!("pid:    (no process)"),
    }
    println!("remote: {}", remote);
    println!("arch:   {}", arch.as_deref().unwrap_or("(unknown)"));
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help           - Show this help message");
    println!("  quit/exit/q    - Exit");
    println!();
    println!("Automation commands:");
    println!("  eval <expr>    - Evaluate an expression to canonical hex (alias: e)");
    println!("  argv <text>    - Tokenize text, substituting $references");
    println!("  reg <name>     - Read a register (case-insensitive)");
    println!("  regs           - Read all general registers");
    println!("  setreg <n> <v> - Write a register");
    println!("  status         - Show process status");
    println!("  meta           - Show file, pid, remote and architecture");
    println!();
    println!("Breakpoint commands:");
    println!("  bp <addr>      - Set breakpoint at address");
    println!("  tbp <addr>     - Set temporary breakpoint at address");
    println!("  bps            - List breakpoints");
    println!("  bpdel [n]      - Delete breakpoint n, or all");
    println!("  bpon/bpoff <n> - Enable/disable breakpoint n");
    println!();
    println!("Anything else is sent to the debugger as-is.");
    println!();
    println!("Examples:");
    println!("  file /usr/bin/ls");
    println!("  start");
    println!("  eval $rip + 0x10");
    println!("  bp 0x555555559000");
}
