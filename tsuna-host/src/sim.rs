//! シミュレーションホスト
//!
//! 実際のGDBを起動せずに、自動化レイヤーが使うディレクティブの一部をGDBと同じ書式で
//! 応答する決定的なホストです。実行ファイルは読み込まず、インフェリアも実在しません。
//! テストと `--sim` モードで使用します。

use crate::calc::{self, Env, Value};
use crate::channel::{Channel, HostError, Reply, ReplyStatus};
use crate::regs::{self, RegisterSpec};
use crate::Result;
use std::collections::HashMap;
use tracing::debug;

/// `main` のアドレス（`start` の停止位置）
const MAIN_ADDRESS: u64 = 0x5555_5555_8b40;
/// 実行ファイルのエントリポイント
const ENTRY_POINT: u64 = 0x5555_5555_aaf0;
/// `main` から戻った直後のアドレス
const MAIN_RETURN_ADDRESS: u64 = 0x7fff_f7c2_9d90;
/// 動的リンカの開始アドレス（リモート接続直後の停止位置）
const LOADER_START: u64 = 0x7fff_f7fe_3290;
/// 初期スタックポインタ
const INITIAL_SP: u64 = 0x7fff_ffff_e3a8;
/// 最初に割り当てるプロセスID
const FIRST_PID: i32 = 31337;

/// 命令を実行できるアドレス範囲
const MAPPED_RANGES: &[(u64, u64)] = &[
    (0x5555_5555_4000, 0x5555_5557_2000),
    (0x7fff_f7c0_0000, 0x7fff_f800_0000),
];

const UNDEFINED_COMMAND: &str = "Undefined command";
const NOT_RUNNING: &str = "The program is not being run.";
const THREAD_RUNNING: &str = "Selected thread is running.";

fn is_mapped(address: u64) -> bool {
    MAPPED_RANGES
        .iter()
        .any(|&(start, end)| address >= start && address < end)
}

/// インフェリアの停止理由
#[derive(Debug, Clone, PartialEq, Eq)]
enum Halt {
    /// ブレークポイントで停止（Noneは削除済みの一時ブレークポイント）
    Breakpoint(Option<u32>),
    /// シグナルを受けて停止
    Signal {
        name: &'static str,
        description: &'static str,
    },
    /// finishなどのステップ実行後
    Stepped,
    /// リモート接続直後
    Attached,
    /// バックグラウンドで実行中
    Running,
}

/// シミュレートされたインフェリア
#[derive(Debug, Clone)]
struct Inferior {
    pid: i32,
    registers: HashMap<&'static str, u64>,
    halt: Halt,
}

impl Inferior {
    fn new(pid: i32, pc: u64) -> Self {
        let mut registers: HashMap<&'static str, u64> =
            regs::general_registers().map(|spec| (spec.name, 0)).collect();
        registers.insert("rip", pc);
        registers.insert("rsp", INITIAL_SP);
        registers.insert("rax", 0x1c);
        registers.insert("eflags", 0x246);
        registers.insert("cs", 0x33);
        registers.insert("ss", 0x2b);

        Self {
            pid,
            registers,
            halt: Halt::Breakpoint(None),
        }
    }

    fn pc(&self) -> u64 {
        self.registers.get("rip").copied().unwrap_or_default()
    }

    fn read(&self, spec: &'static RegisterSpec) -> u64 {
        let root = spec.root();
        spec.extract(self.registers.get(root.name).copied().unwrap_or_default())
    }

    fn write(&mut self, spec: &'static RegisterSpec, value: u64) {
        let root = spec.root();
        let entry = self.registers.entry(root.name).or_default();
        *entry = spec.compose(*entry, value);
    }
}

/// シミュレートされたブレークポイント
#[derive(Debug, Clone)]
struct SimBreakpoint {
    number: u32,
    temporary: bool,
    enabled: bool,
    address: u64,
    hits: u32,
}

/// GDBの応答をシミュレートするホスト
#[derive(Debug)]
pub struct SimHost {
    file: Option<String>,
    inferior: Option<Inferior>,
    breakpoints: Vec<SimBreakpoint>,
    next_breakpoint: u32,
    convenience: HashMap<String, u64>,
    history: Vec<u64>,
    remote: Option<String>,
    next_pid: i32,
    alive: bool,
}

impl SimHost {
    /// 何も読み込まれていないホストを作成する
    pub fn new() -> Self {
        Self {
            file: None,
            inferior: None,
            breakpoints: Vec::new(),
            next_breakpoint: 1,
            convenience: HashMap::new(),
            history: Vec::new(),
            remote: None,
            next_pid: FIRST_PID,
            alive: true,
        }
    }

    /// ディレクティブを1つ処理し、コンソール出力またはエラーメッセージを返す
    fn dispatch(&mut self, directive: &str) -> std::result::Result<String, String> {
        let directive = directive.trim();
        let (command, args) = directive
            .split_once(char::is_whitespace)
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((directive, ""));
        let (command, format) = command.split_once('/').unwrap_or((command, ""));

        match command {
            "" => Ok(String::new()),
            "echo" => Ok(unescape_echo(args)),
            "help" | "h" => Ok(HELP_TEXT.to_string()),
            "file" => self.load_file(args),
            "start" => self.start(true),
            "run" | "r" => self.start(false),
            "continue" | "c" | "fg" => self.continue_execution(args),
            "interrupt" => self.interrupt(),
            "finish" | "fin" => self.finish(),
            "kill" | "k" => self.kill(),
            "detach" => self.detach(),
            "target" => self.target(args),
            "set" => self.set(args),
            "output" => self.output(args, format),
            "print" | "p" | "call" => self.print_history(args, format, command == "call"),
            "break" | "b" | "br" => self.add_breakpoint(args, false),
            "tbreak" => self.add_breakpoint(args, true),
            "delete" | "d" => self.delete_breakpoints(args),
            "enable" => self.toggle_breakpoints(args, true),
            "disable" => self.toggle_breakpoints(args, false),
            "info" | "i" => self.info(args),
            "show" => self.show(args),
            _ => Err(format!(
                "{}: \"{}\".  Try \"help\".",
                UNDEFINED_COMMAND, command
            )),
        }
    }

    fn load_file(&mut self, args: &str) -> std::result::Result<String, String> {
        if args.is_empty() {
            self.file = None;
            return Ok("No executable file now.\nNo symbol file now.\n".to_string());
        }

        let path = args.to_string();
        let out = format!(
            "Reading symbols from {}...\n(No debugging symbols found in {})\n",
            path, path
        );
        self.file = Some(path);
        Ok(out)
    }

    fn spawn_inferior(&mut self, pc: u64) -> &mut Inferior {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.inferior.insert(Inferior::new(pid, pc))
    }

    fn start(&mut self, stop_at_main: bool) -> std::result::Result<String, String> {
        if self.file.is_none() {
            return Err(
                "No executable file specified.\nUse the \"file\" or \"exec-file\" command."
                    .to_string(),
            );
        }

        self.inferior = None;
        self.check_insertable()?;

        if stop_at_main {
            let number = self.next_breakpoint;
            self.next_breakpoint += 1;
            self.spawn_inferior(MAIN_ADDRESS);
            return Ok(format!(
                "Temporary breakpoint {n} at {addr:#x}\n\nTemporary breakpoint {n}, {addr:#018x} in main ()\n",
                n = number,
                addr = MAIN_ADDRESS
            ));
        }

        self.spawn_inferior(ENTRY_POINT).halt = Halt::Stepped;
        self.resume()
    }

    fn continue_execution(&mut self, args: &str) -> std::result::Result<String, String> {
        let inferior = self.inferior.as_mut().ok_or(NOT_RUNNING)?;
        if inferior.halt == Halt::Running {
            return Err("Cannot execute this command while the selected thread is running.".to_string());
        }

        if args.ends_with('&') {
            self.check_insertable()?;
            inferior_mut(&mut self.inferior)?.halt = Halt::Running;
            return Ok("Continuing.\n".to_string());
        }

        let out = self.resume()?;
        Ok(format!("Continuing.\n{}", out))
    }

    /// インフェリアを次の停止点まで進める
    fn resume(&mut self) -> std::result::Result<String, String> {
        self.check_insertable()?;
        let inferior = inferior_mut(&mut self.inferior)?;
        let pid = inferior.pid;

        if let Halt::Signal { name, description } = inferior.halt {
            self.inferior = None;
            return Ok(format!(
                "\nProgram terminated with signal {}, {}.\nThe program no longer exists.\n",
                name, description
            ));
        }

        let pc = inferior.pc();
        if !is_mapped(pc) {
            inferior.halt = Halt::Signal {
                name: "SIGSEGV",
                description: "Segmentation fault",
            };
            return Ok(format!(
                "\nProgram received signal SIGSEGV, Segmentation fault.\n{:#018x} in ?? ()\n",
                pc
            ));
        }

        let next = self
            .breakpoints
            .iter_mut()
            .find(|bp| bp.enabled && bp.address != pc);
        let Some(bp) = next else {
            self.inferior = None;
            return Ok(format!(
                "[Inferior 1 (process {}) exited normally]\n",
                pid
            ));
        };

        bp.hits += 1;
        let (number, address, temporary) = (bp.number, bp.address, bp.temporary);
        inferior.registers.insert("rip", address);

        if temporary {
            self.breakpoints.retain(|bp| bp.number != number);
            inferior.halt = Halt::Breakpoint(None);
            return Ok(format!(
                "\nTemporary breakpoint {}, {:#018x} in ?? ()\n",
                number, address
            ));
        }

        inferior.halt = Halt::Breakpoint(Some(number));
        Ok(format!("\nBreakpoint {}, {:#018x} in ?? ()\n", number, address))
    }

    /// 有効なブレークポイントがすべて書き込み可能なアドレスにあるか確認する
    fn check_insertable(&self) -> std::result::Result<(), String> {
        if let Some(bp) = self
            .breakpoints
            .iter()
            .find(|bp| bp.enabled && !is_mapped(bp.address))
        {
            return Err(format!(
                "Warning:\nCannot insert breakpoint {}.\nCannot access memory at address {:#x}\n",
                bp.number, bp.address
            ));
        }
        Ok(())
    }

    fn interrupt(&mut self) -> std::result::Result<String, String> {
        let inferior = inferior_mut(&mut self.inferior)?;
        if inferior.halt != Halt::Running {
            return Ok(String::new());
        }
        inferior.halt = Halt::Signal {
            name: "SIGINT",
            description: "Interrupt",
        };
        Ok("\nProgram received signal SIGINT, Interrupt.\n".to_string())
    }

    fn finish(&mut self) -> std::result::Result<String, String> {
        let inferior = inferior_mut(&mut self.inferior)?;
        match inferior.halt {
            Halt::Running => Err(THREAD_RUNNING.to_string()),
            Halt::Signal { .. } | Halt::Attached => {
                Err("\"finish\" not meaningful in the outermost frame.".to_string())
            }
            _ => {
                let pc = inferior.pc();
                inferior.registers.insert("rip", MAIN_RETURN_ADDRESS);
                inferior.registers.insert("rax", 0);
                inferior.halt = Halt::Stepped;
                Ok(format!(
                    "Run till exit from #0  {:#018x} in main ()\n{:#018x} in __libc_start_call_main () from /lib/x86_64-linux-gnu/libc.so.6\n",
                    pc, MAIN_RETURN_ADDRESS
                ))
            }
        }
    }

    fn kill(&mut self) -> std::result::Result<String, String> {
        let inferior = self.inferior.take().ok_or(NOT_RUNNING)?;
        Ok(format!("[Inferior 1 (process {}) killed]\n", inferior.pid))
    }

    fn detach(&mut self) -> std::result::Result<String, String> {
        let inferior = self.inferior.take().ok_or(NOT_RUNNING)?;
        let mut out = format!(
            "Detaching from program: {}, process {}\n",
            self.file.as_deref().unwrap_or_default(),
            inferior.pid
        );
        if self.remote.take().is_some() {
            out.push_str("Ending remote debugging.\n");
        }
        out.push_str(&format!("[Inferior 1 (process {}) detached]\n", inferior.pid));
        Ok(out)
    }

    fn target(&mut self, args: &str) -> std::result::Result<String, String> {
        let (kind, address) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
        match kind {
            "remote" | "extended-remote" => {
                let address = address.trim();
                if address.is_empty() {
                    return Err("To open a remote debug connection, you need to specify what\nserial device is attached to the remote system\n(e.g. /dev/ttyS0, /dev/ttya COM1, etc.).".to_string());
                }
                self.remote = Some(address.to_string());
                self.spawn_inferior(LOADER_START).halt = Halt::Attached;
                Ok(format!(
                    "Remote debugging using {}\n{:#018x} in _start () from /lib64/ld-linux-x86-64.so.2\n",
                    address, LOADER_START
                ))
            }
            "" => Err("Argument required (target name).".to_string()),
            other => Err(format!(
                "{}: \"target {}\".  Try \"help target\".",
                UNDEFINED_COMMAND, other
            )),
        }
    }

    fn set(&mut self, args: &str) -> std::result::Result<String, String> {
        let expr = args
            .strip_prefix("variable ")
            .or_else(|| args.strip_prefix("var "))
            .unwrap_or(args)
            .trim();

        if expr.starts_with('$') {
            self.evaluate(expr)?;
        }
        // それ以外の設定（confirm, pagination, logging など）は受理するだけ
        Ok(String::new())
    }

    fn evaluate(&mut self, expr: &str) -> std::result::Result<Value, String> {
        if let Some(inferior) = &self.inferior {
            if inferior.halt == Halt::Running && expr.contains('$') {
                return Err(THREAD_RUNNING.to_string());
            }
        }
        calc::eval(expr, self)
    }

    /// `output` コマンド（値履歴に記録しない）
    fn output(&mut self, expr: &str, format: &str) -> std::result::Result<String, String> {
        let value = self.evaluate(expr)?;
        Ok(format_value(value, format))
    }

    /// `print` / `call` コマンド（値履歴に記録する）
    fn print_history(
        &mut self,
        expr: &str,
        format: &str,
        call: bool,
    ) -> std::result::Result<String, String> {
        let value = if expr.is_empty() {
            self.read_var("")?
        } else {
            self.evaluate(expr)?
        };

        match value {
            Value::Int(v) => {
                self.history.push(v);
                Ok(format!("${} = {}\n", self.history.len(), format_value(value, format)))
            }
            Value::Void if call => Ok(String::new()),
            Value::Void => Ok(format!("${} = void\n", self.history.len() + 1)),
        }
    }

    fn add_breakpoint(&mut self, args: &str, temporary: bool) -> std::result::Result<String, String> {
        let address = if let Some(expr) = args.strip_prefix('*') {
            match self.evaluate(expr.trim())? {
                Value::Int(v) => v,
                Value::Void => return Err("Invalid cast.".to_string()),
            }
        } else if args == "main" {
            MAIN_ADDRESS
        } else if args.is_empty() {
            self.inferior
                .as_ref()
                .map(Inferior::pc)
                .ok_or("No default breakpoint address now.")?
        } else {
            return Err(format!("Function \"{}\" not defined.", args));
        };

        let number = self.next_breakpoint;
        self.next_breakpoint += 1;
        self.breakpoints.push(SimBreakpoint {
            number,
            temporary,
            enabled: true,
            address,
            hits: 0,
        });

        let label = if temporary { "Temporary breakpoint" } else { "Breakpoint" };
        Ok(format!("{} {} at {:#x}\n", label, number, address))
    }

    fn parse_numbers(args: &str) -> std::result::Result<Vec<u32>, String> {
        args.split_whitespace()
            .filter(|arg| *arg != "breakpoints")
            .map(|arg| {
                arg.parse::<u32>()
                    .map_err(|_| format!("Bad breakpoint argument: '{}'", arg))
            })
            .collect()
    }

    fn delete_breakpoints(&mut self, args: &str) -> std::result::Result<String, String> {
        let numbers = Self::parse_numbers(args)?;
        if numbers.is_empty() {
            self.breakpoints.clear();
            return Ok(String::new());
        }

        for number in numbers {
            let before = self.breakpoints.len();
            self.breakpoints.retain(|bp| bp.number != number);
            if self.breakpoints.len() == before {
                return Err(format!("No breakpoint number {}.", number));
            }
        }
        Ok(String::new())
    }

    fn toggle_breakpoints(&mut self, args: &str, enabled: bool) -> std::result::Result<String, String> {
        let numbers = Self::parse_numbers(args)?;
        for bp in self.breakpoints.iter_mut() {
            if numbers.is_empty() || numbers.contains(&bp.number) {
                bp.enabled = enabled;
            }
        }
        if let Some(missing) = numbers
            .iter()
            .find(|n| !self.breakpoints.iter().any(|bp| bp.number == **n))
        {
            return Err(format!("No breakpoint number {}.", missing));
        }
        Ok(String::new())
    }

    fn info(&mut self, args: &str) -> std::result::Result<String, String> {
        let (topic, rest) = args
            .split_once(char::is_whitespace)
            .map(|(t, r)| (t, r.trim()))
            .unwrap_or((args, ""));

        match topic {
            "b" | "br" | "break" | "breakpoints" => Ok(self.info_breakpoints()),
            "r" | "reg" | "registers" => self.info_registers(rest),
            "program" => self.info_program(),
            "inferiors" => Ok(self.info_inferiors()),
            "files" | "target" => Ok(self.info_files()),
            "" => Err("List of info subcommands:\n\ninfo breakpoints -- Status of specified breakpoints.".to_string()),
            other => Err(format!(
                "{}: \"info {}\".  Try \"help info\".",
                UNDEFINED_COMMAND, other
            )),
        }
    }

    fn info_breakpoints(&self) -> String {
        if self.breakpoints.is_empty() {
            return "No breakpoints or watchpoints.\n".to_string();
        }

        let mut out = "Num     Type           Disp Enb Address            What\n".to_string();
        for bp in &self.breakpoints {
            let what = if bp.address == MAIN_ADDRESS { "<main+4>" } else { "" };
            out.push_str(&format!(
                "{:<7} {:<14} {:<4} {:<3} {:#018x} {}\n",
                bp.number,
                "breakpoint",
                if bp.temporary { "del" } else { "keep" },
                if bp.enabled { "y" } else { "n" },
                bp.address,
                what
            ));
            if bp.hits > 0 {
                out.push_str(&format!(
                    "\tbreakpoint already hit {} time{}\n",
                    bp.hits,
                    if bp.hits == 1 { "" } else { "s" }
                ));
            }
        }
        out
    }

    fn info_registers(&self, names: &str) -> std::result::Result<String, String> {
        let inferior = self
            .inferior
            .as_ref()
            .ok_or("The program has no registers now.")?;
        if inferior.halt == Halt::Running {
            return Err(THREAD_RUNNING.to_string());
        }

        let specs: Vec<&'static RegisterSpec> = if names.is_empty() {
            regs::general_registers().collect()
        } else {
            names
                .split_whitespace()
                .map(|name| {
                    let name = name.trim_start_matches('$');
                    exact_register(name).ok_or_else(|| format!("Invalid register `{}'", name))
                })
                .collect::<std::result::Result<_, _>>()?
        };

        let mut out = String::new();
        for spec in specs {
            let value = inferior.read(spec);
            out.push_str(&format!(
                "{:<15}{:<19}{}\n",
                spec.name,
                format!("{:#x}", value),
                natural_register_value(spec, value)
            ));
        }
        Ok(out)
    }

    fn info_program(&self) -> std::result::Result<String, String> {
        let Some(inferior) = &self.inferior else {
            return Ok("The program being debugged is not being run.\n".to_string());
        };

        let mut out = String::new();
        if self.remote.is_some() {
            out.push_str("\tDebugging a target over a serial line.\n");
        }

        let reason = match &inferior.halt {
            Halt::Running => return Err(THREAD_RUNNING.to_string()),
            Halt::Breakpoint(None) => {
                "It stopped at a breakpoint that has since been deleted.\n".to_string()
            }
            Halt::Breakpoint(Some(n)) => format!("It stopped at breakpoint {}.\n", n),
            Halt::Signal { name, description } => {
                format!("It stopped at signal {}, {}.\n", name, description)
            }
            Halt::Stepped => "It stopped after being stepped.\n".to_string(),
            Halt::Attached => String::new(),
        };

        out.push_str(&format!(
            "\tUsing the running image of child process {}.\nProgram stopped at {:#x}.\n{}",
            inferior.pid,
            inferior.pc(),
            reason
        ));
        Ok(out)
    }

    fn info_inferiors(&self) -> String {
        let description = self
            .inferior
            .as_ref()
            .map(|inferior| format!("process {}", inferior.pid))
            .unwrap_or_else(|| "<null>".to_string());
        let connection = match (&self.inferior, &self.remote) {
            (_, Some(address)) => format!("1 (remote {})", address),
            (Some(_), None) => "1 (native)".to_string(),
            (None, None) => String::new(),
        };

        format!(
            "  Num  Description       Connection           Executable        \n* 1    {:<17} {:<20} {} \n",
            description,
            connection,
            self.file.as_deref().unwrap_or_default()
        )
    }

    fn info_files(&self) -> String {
        let mut out = String::new();
        if let Some(file) = &self.file {
            out.push_str(&format!(
                "Symbols from \"{f}\".\nLocal exec file:\n\t`{f}', file type elf64-x86-64.\n\tEntry point: {e:#x}\n",
                f = file,
                e = ENTRY_POINT
            ));
        }
        if let Some(inferior) = &self.inferior {
            out.push_str(&format!(
                "Native process:\n\tUsing the running image of child process {}.\n",
                inferior.pid
            ));
        }
        out
    }

    fn show(&self, args: &str) -> std::result::Result<String, String> {
        match args {
            "architecture" | "arch" => Ok(
                "The target architecture is set to \"auto\" (currently \"i386:x86-64\").\n"
                    .to_string(),
            ),
            "version" => Ok("GNU gdb (tsuna simulated host) 14.2\n".to_string()),
            _ => Err(format!(
                "{}: \"show {}\".  Try \"help show\".",
                UNDEFINED_COMMAND, args
            )),
        }
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for SimHost {
    fn read_var(&self, name: &str) -> std::result::Result<Value, String> {
        if name.is_empty() {
            return Ok(self.history.last().copied().map_or(Value::Void, Value::Int));
        }
        if let Ok(index) = name.parse::<usize>() {
            return self
                .history
                .get(index.wrapping_sub(1))
                .copied()
                .map(Value::Int)
                .ok_or_else(|| format!("History has not yet reached ${}.", index));
        }
        if let Some(spec) = exact_register(name) {
            let inferior = self.inferior.as_ref().ok_or("No registers.")?;
            return Ok(Value::Int(inferior.read(spec)));
        }
        Ok(self
            .convenience
            .get(name)
            .copied()
            .map_or(Value::Void, Value::Int))
    }

    fn write_var(&mut self, name: &str, value: u64) -> std::result::Result<(), String> {
        if let Some(spec) = exact_register(name) {
            let inferior = self.inferior.as_mut().ok_or("No registers.")?;
            inferior.write(spec, value);
            return Ok(());
        }
        if name.is_empty() || name.parse::<usize>().is_ok() {
            return Err("Left operand of assignment is not a modifiable lvalue.".to_string());
        }
        self.convenience.insert(name.to_string(), value);
        Ok(())
    }

    fn call(&mut self, func: &str) -> std::result::Result<u64, String> {
        let inferior = self
            .inferior
            .as_ref()
            .ok_or("You can't do that without a process to debug.")?;
        match func {
            "getpid" => Ok(inferior.pid as u64),
            _ => Err(format!("No symbol \"{}\" in current context.", func)),
        }
    }
}

impl Channel for SimHost {
    fn request(&mut self, directive: &str) -> Result<Reply> {
        if !self.alive {
            return Err(HostError::Exited.into());
        }

        debug!("sim directive: {}", directive);
        if matches!(directive.trim(), "quit" | "q") {
            self.alive = false;
            return Ok(Reply {
                status: ReplyStatus::Exited,
                console: String::new(),
                log: String::new(),
            });
        }

        Ok(match self.dispatch(directive) {
            Ok(console) => Reply::done(console),
            Err(message) => Reply::error(message),
        })
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

fn inferior_mut(inferior: &mut Option<Inferior>) -> std::result::Result<&mut Inferior, String> {
    inferior.as_mut().ok_or_else(|| NOT_RUNNING.to_string())
}

/// GDBと同じく大文字小文字を区別してレジスタを引く
fn exact_register(name: &str) -> Option<&'static RegisterSpec> {
    regs::lookup(name).filter(|spec| spec.name == name)
}

fn format_value(value: Value, format: &str) -> String {
    match (value, format) {
        (Value::Void, _) => "void".to_string(),
        (Value::Int(v), "x") => format!("{:#x}", v),
        (Value::Int(v), "o") => format!("{:#o}", v),
        (Value::Int(v), "t") => format!("{:b}", v),
        (Value::Int(v), _) => v.to_string(),
    }
}

fn natural_register_value(spec: &RegisterSpec, value: u64) -> String {
    match spec.name {
        "rip" | "pc" => format!("{:#x} <main+4>", value),
        "rsp" | "rbp" | "sp" | "fp" => format!("{:#x}", value),
        "eflags" => {
            const FLAGS: &[(u32, &str)] = &[
                (0, "CF"),
                (2, "PF"),
                (4, "AF"),
                (6, "ZF"),
                (7, "SF"),
                (8, "TF"),
                (9, "IF"),
                (10, "DF"),
                (11, "OF"),
            ];
            let set: Vec<&str> = FLAGS
                .iter()
                .filter(|(bit, _)| value & (1 << bit) != 0)
                .map(|(_, name)| *name)
                .collect();
            format!("[ {} ]", set.join(" "))
        }
        _ => value.to_string(),
    }
}

/// `echo` の引数のエスケープを展開する
fn unescape_echo(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

const HELP_TEXT: &str = "List of classes of commands:

breakpoints -- Making program stop at certain points.
data -- Examining data.
files -- Specifying and examining files.
running -- Running the program.
status -- Status inquiries.

Type \"help\" followed by a class name for a list of commands in that class.
";

#[cfg(test)]
mod tests {
    use super::*;

    fn run(host: &mut SimHost, directive: &str) -> Reply {
        host.request(directive).unwrap()
    }

    #[test]
    fn test_unknown_command_is_error() {
        let mut host = SimHost::new();
        let reply = run(&mut host, "unknown_command");
        assert!(!reply.is_success());
        assert!(reply.error_message().unwrap().starts_with(UNDEFINED_COMMAND));
    }

    #[test]
    fn test_echo() {
        let mut host = SimHost::new();
        assert_eq!(run(&mut host, "echo x").console, "x");
        assert_eq!(run(&mut host, "echo a\\nb\\n").console, "a\nb\n");
    }

    #[test]
    fn test_output_hex() {
        let mut host = SimHost::new();
        assert_eq!(run(&mut host, "output/x 1 + 1").console, "0x2");
        assert_eq!(run(&mut host, "output 0x10").console, "16");
        assert_eq!(run(&mut host, "output $nothing").console, "void");
    }

    #[test]
    fn test_registers_need_process() {
        let mut host = SimHost::new();
        let reply = run(&mut host, "output/x $eax");
        assert_eq!(reply.error_message(), Some("No registers."));

        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "set $eax=1337");
        run(&mut host, "set $al=13");
        assert_eq!(
            run(&mut host, "output $eax").console,
            ((1337 & 0xff00) + 13).to_string()
        );
    }

    #[test]
    fn test_register_names_are_case_sensitive() {
        let mut host = SimHost::new();
        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "set $eax=5");
        assert_eq!(run(&mut host, "output $EAX").console, "void");
    }

    #[test]
    fn test_start_and_segfault() {
        let mut host = SimHost::new();
        assert!(!run(&mut host, "start").is_success());

        run(&mut host, "file /usr/bin/ls");
        let reply = run(&mut host, "start");
        assert!(reply.console.contains("Temporary breakpoint 1"));
        assert!(run(&mut host, "info program")
            .console
            .contains("It stopped at a breakpoint that has since been deleted."));

        run(&mut host, "set $pc=0x0");
        let reply = run(&mut host, "continue");
        assert!(reply.console.contains("Program received signal SIGSEGV"));
        assert!(run(&mut host, "info program")
            .console
            .contains("It stopped at signal SIGSEGV, Segmentation fault."));

        run(&mut host, "kill");
        assert!(run(&mut host, "info program").console.contains("not being run"));
    }

    #[test]
    fn test_breakpoint_table() {
        let mut host = SimHost::new();
        assert_eq!(
            run(&mut host, "info breakpoints").console,
            "No breakpoints or watchpoints.\n"
        );

        assert_eq!(run(&mut host, "break *0x1337").console, "Breakpoint 1 at 0x1337\n");
        run(&mut host, "tbreak *0xdeadbeef");
        let table = run(&mut host, "info breakpoints").console;
        assert!(table.contains("1       breakpoint     keep y   0x0000000000001337"));
        assert!(table.contains("2       breakpoint     del  y   0x00000000deadbeef"));

        run(&mut host, "delete 1");
        assert!(!run(&mut host, "info breakpoints").console.contains("0x1337"));
        assert!(!run(&mut host, "delete 7").is_success());
        run(&mut host, "delete");
        assert_eq!(
            run(&mut host, "info breakpoints").console,
            "No breakpoints or watchpoints.\n"
        );
    }

    #[test]
    fn test_continue_hits_breakpoint() {
        let mut host = SimHost::new();
        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "break *0x555555559000");

        let reply = run(&mut host, "continue");
        assert!(reply.console.contains("Breakpoint 2, 0x0000555555559000"));
        assert!(run(&mut host, "info program")
            .console
            .contains("It stopped at breakpoint 2."));
        assert!(run(&mut host, "info breakpoints")
            .console
            .contains("breakpoint already hit 1 time"));

        let reply = run(&mut host, "continue");
        assert!(reply.console.contains("exited normally"));
    }

    #[test]
    fn test_unmapped_breakpoint_blocks_resume() {
        let mut host = SimHost::new();
        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "break *0x1337");
        let reply = run(&mut host, "continue");
        assert!(reply.error_message().unwrap().contains("Cannot insert breakpoint 2."));
    }

    #[test]
    fn test_history_and_getpid() {
        let mut host = SimHost::new();
        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "call getpid()");
        let reply = run(&mut host, "print $");
        assert_eq!(reply.console, format!("$2 = {}\n", FIRST_PID));
    }

    #[test]
    fn test_running_in_background() {
        let mut host = SimHost::new();
        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        run(&mut host, "continue &");
        assert_eq!(
            run(&mut host, "info program").error_message(),
            Some(THREAD_RUNNING)
        );
        assert!(run(&mut host, "info inferiors").console.contains("process 31337"));

        run(&mut host, "interrupt");
        assert!(run(&mut host, "info program").console.contains("signal SIGINT"));
    }

    #[test]
    fn test_remote_target() {
        let mut host = SimHost::new();
        assert!(!run(&mut host, "target remote").is_success());
        run(&mut host, "target remote localhost:1234");
        assert!(run(&mut host, "info program").console.contains("serial line"));
        assert!(run(&mut host, "info inferiors")
            .console
            .contains("1 (remote localhost:1234)"));
        run(&mut host, "detach");
        assert!(!run(&mut host, "info program").console.contains("serial line"));
    }

    #[test]
    fn test_info_registers() {
        let mut host = SimHost::new();
        assert!(!run(&mut host, "info registers").is_success());

        run(&mut host, "file /usr/bin/ls");
        run(&mut host, "start");
        let out = run(&mut host, "info registers rax eflags").console;
        assert_eq!(
            out,
            "rax            0x1c               28\neflags         0x246              [ PF ZF IF ]\n"
        );
        assert_eq!(
            run(&mut host, "info registers foo").error_message(),
            Some("Invalid register `foo'")
        );
    }

    #[test]
    fn test_quit_closes_channel() {
        let mut host = SimHost::new();
        let reply = run(&mut host, "quit");
        assert_eq!(reply.status, ReplyStatus::Exited);
        assert!(!host.is_alive());
        assert!(host.request("echo x").is_err());
    }
}
