//! sdb CLI - コマンドラインインターフェース
//!
//! エミュレートされたRV64マシン用デバッガ sdb のモニタ（REPL）

use anyhow::{Context as _, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sdb_core::command::COMMANDS;
use sdb_core::disasm::format_trace_line;
use sdb_core::{Command, CommandError, Debugger, ExecState, InfoTarget, StopReason};
use sdb_target::{Machine, Memory, DEFAULT_MEMORY_SIZE, MEMORY_BASE};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// sdb - Simple Debugger for an emulated RV64 machine
#[derive(Parser)]
#[command(name = "sdb")]
#[command(version)]
#[command(about = "Monitor with expression evaluation and watchpoints for an emulated RV64 machine", long_about = None)]
struct Cli {
    /// Raw binary image loaded at 0x80000000 (a built-in image is used if omitted)
    image: Option<PathBuf>,

    /// Run the program to the end without entering the monitor
    #[arg(short, long)]
    batch: bool,

    /// Guest memory size in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE, value_parser = parse_size)]
    mem_size: usize,

    /// Tracing filter directive (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

fn parse_size(s: &str) -> std::result::Result<usize, String> {
    sdb_core::parse::parse_count(s)
        .map(|v| v as usize)
        .map_err(|e| e.to_string())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    println!("sdb - Simple Debugger");
    println!("Version {}", env!("CARGO_PKG_VERSION"));
    println!();

    let machine = init_machine(&cli)?;
    let memory = machine.memory();
    println!(
        "Physical memory area [0x{:x}, 0x{:x})",
        memory.base(),
        memory.base() + memory.size() as u64
    );
    let mut debugger = Debugger::new(machine)?;

    if cli.batch {
        handle_execute(&mut debugger, u64::MAX)?;
    } else {
        run_repl(&mut debugger)?;
    }

    Ok(exit_code(debugger.state()))
}

/// tracing サブスクライバを初期化する
fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// マシンを作成し、イメージを読み込む
fn init_machine(cli: &Cli) -> Result<Machine> {
    match &cli.image {
        Some(path) => {
            let image = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let mut machine = Machine::new(Memory::new(MEMORY_BASE, cli.mem_size));
            machine.load_image(&image)?;
            println!("Loaded image {} ({} bytes) at 0x{:x}", path.display(), image.len(), MEMORY_BASE);
            Ok(machine)
        }
        None => {
            println!("No image is given. Using the built-in image.");
            Machine::with_default_image(cli.mem_size)
        }
    }
}

/// 終了状態から終了コードを決める
///
/// モニタから抜けた場合と、a0 = 0 で終了した場合を成功とします。
fn exit_code(state: ExecState) -> ExitCode {
    match state {
        ExecState::Stopped | ExecState::Ended { code: 0, .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    println!("Type 'help' for available commands, 'q' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(sdb) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(debugger, line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("Error: {:#}", e),
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

    Ok(())
}

/// コマンドを処理する（`false` ならREPLを終了する）
fn handle_command(debugger: &mut Debugger, line: &str) -> Result<bool> {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(CommandError::Empty) => return Ok(true),
        Err(e) => {
            println!("{}", e);
            return Ok(true);
        }
    };

    match command {
        Command::Help(name) => print_help(name.as_deref()),
        Command::Quit => return Ok(false),
        Command::Continue => handle_execute(debugger, u64::MAX)?,
        Command::Step(steps) => handle_execute(debugger, steps)?,
        Command::Info(InfoTarget::Registers) => print_registers(debugger),
        Command::Info(InfoTarget::Watchpoints) => print_watchpoints(debugger),
        Command::Examine { count, expression } => handle_examine(debugger, count, &expression)?,
        Command::Print(expression) => handle_print(debugger, &expression)?,
        Command::Watch(expression) => handle_watch(debugger, &expression)?,
        Command::Delete(id) => {
            debugger.delete_watchpoint(id)?;
            println!("Watchpoint {} deleted", id);
        }
    }

    Ok(true)
}

/// `c` / `si` コマンドを処理する
fn handle_execute(debugger: &mut Debugger, steps: u64) -> Result<()> {
    let report = debugger.execute(steps)?;

    for entry in &report.trace {
        println!("{}", format_trace_line(entry.pc, entry.raw));
    }

    match report.reason {
        StopReason::StepsDone => {}
        StopReason::Watchpoint(hits) => {
            for hit in hits {
                println!();
                println!("Watchpoint {}: {}", hit.id, hit.expression);
                println!("Old value = {} (0x{:x})", hit.old_value, hit.old_value);
                println!("New value = {} (0x{:x})", hit.new_value, hit.new_value);
            }
            println!();
            println!("Stopped at 0x{:x}", debugger.registers().pc());
        }
        StopReason::Exited { pc, code } => {
            let verdict = if code == 0 { "HIT GOOD TRAP" } else { "HIT BAD TRAP" };
            println!("sdb: {} at pc = 0x{:016x} (code {})", verdict, pc, code);
        }
        StopReason::AlreadyEnded => {
            println!("Program execution has ended. To restart the program, exit sdb and run again.");
        }
    }

    Ok(())
}

/// `x` コマンドを処理する
fn handle_examine(debugger: &Debugger, count: u64, expression: &str) -> Result<()> {
    for (address, value) in debugger.examine(count, expression)? {
        println!("0x{:016x}:  0x{:08x}", address, value);
    }
    Ok(())
}

/// `p` コマンドを処理する
fn handle_print(debugger: &Debugger, expression: &str) -> Result<()> {
    let value = debugger.evaluate_expression(expression)?;
    println!("{} = {} (0x{:x})", expression, value, value);
    Ok(())
}

/// `w` コマンドを処理する
fn handle_watch(debugger: &mut Debugger, expression: &str) -> Result<()> {
    let id = debugger.create_watchpoint(expression)?;
    let value = debugger.watchpoint_value(id).unwrap_or_default();
    println!("Watchpoint {}: {} (current value = 0x{:x})", id, expression, value);
    Ok(())
}

fn print_registers(debugger: &Debugger) {
    for (name, value) in debugger.registers().iter() {
        println!("{:<6}0x{:016x}  {}", name, value, value);
    }
}

fn print_watchpoints(debugger: &Debugger) {
    let mut watchpoints = debugger.list_watchpoints().peekable();
    if watchpoints.peek().is_none() {
        println!("No watchpoints.");
        return;
    }

    println!("Num\tExpression");
    for (id, expression) in watchpoints {
        println!("{}\t{}", id, expression);
    }
}

fn print_help(name: Option<&str>) {
    match name {
        None => {
            println!("Available commands:");
            println!();
            for (name, description) in COMMANDS {
                println!("  {:<6} - {}", name, description);
            }
            println!();
            println!("Examples:");
            println!("  p $sp + 8");
            println!("  x 4 $pc");
            println!("  w *0x80000010");
            println!("  si 3");
        }
        Some(name) => match COMMANDS.iter().find(|(n, _)| *n == name) {
            Some((name, description)) => println!("{} - {}", name, description),
            None => println!("Unknown command '{}'", name),
        },
    }
}
