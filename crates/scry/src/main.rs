use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use scry_core::types::{Address, AddressSpace, ProcessId, ThreadId};
use scry_core::{FindObjectFlags, Program};
use scry_utils::{info, init_logging, warn};

/// Inspect live processes, core dumps, and the running kernel.
#[derive(Parser, Debug)]
#[command(name = "scry")]
#[command(version)]
#[command(about = "Inspect live processes, core dumps, and the running kernel", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

/// Which debug target to open.
#[derive(Args, Debug)]
struct TargetArgs
{
    /// Attach to a running process by PID
    #[arg(long, conflicts_with_all = ["core", "kernel"])]
    pid: Option<u32>,
    /// Open an ELF core dump
    #[arg(long, conflicts_with = "kernel")]
    core: Option<PathBuf>,
    /// Attach to the running kernel via /proc/kcore
    #[arg(long, default_value_t = false)]
    kernel: bool,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List the modules known to the target
    Modules
    {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the target's threads
    Threads
    {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Resolve a symbol by name or by hex address (0x...)
    Symbol
    {
        #[command(flatten)]
        target: TargetArgs,
        /// Symbol name, or address in 0x... form
        query: String,
    },
    /// Look up a type by name
    Type
    {
        #[command(flatten)]
        target: TargetArgs,
        /// Type name
        name: String,
        /// Restrict to types declared in a file matching this path suffix
        #[arg(long)]
        filename: Option<String>,
    },
    /// Look up an object (variable, function, or constant) by name
    Object
    {
        #[command(flatten)]
        target: TargetArgs,
        /// Object name
        name: String,
        /// Restrict to objects declared in a file matching this path suffix
        #[arg(long)]
        filename: Option<String>,
    },
    /// Print a stack trace for a thread
    Trace
    {
        #[command(flatten)]
        target: TargetArgs,
        /// Thread id (defaults to the main thread)
        tid: Option<u64>,
    },
    /// Read target memory
    Read
    {
        #[command(flatten)]
        target: TargetArgs,
        /// Memory address to read from (hex format: 0x1000 or decimal)
        address: String,
        /// Number of bytes to read (default: 16)
        #[arg(short, long, default_value_t = 16)]
        length: u64,
    },
}

fn main()
{
    // Initialize logging (reads from RUST_LOG env var)
    // Defaults to INFO level and Pretty format if not set
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();
    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn open_program(target: &TargetArgs) -> Result<Program, Box<dyn std::error::Error>>
{
    let mut prog = if let Some(pid) = target.pid {
        info!("Attaching to process {}", pid);
        Program::from_pid(ProcessId::from(pid))?
    } else if let Some(core) = &target.core {
        info!("Opening core dump {}", core.display());
        Program::from_core_dump(core)?
    } else if target.kernel {
        info!("Attaching to the running kernel");
        Program::from_kernel()?
    } else {
        return Err("no target: pass --pid, --core, or --kernel".into());
    };

    // Best effort: a target without reachable debug files is still usable
    // for memory reads and module listings.
    if let Err(e) = prog.load_debug_info(&[], true, false) {
        warn!("debug info incomplete: {}", e);
    }
    Ok(prog)
}

fn parse_address(input: &str) -> Result<u64, Box<dyn std::error::Error>>
{
    let value = if let Some(hex) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)?
    } else {
        input.parse::<u64>()?
    };
    Ok(value)
}

fn run_command(cli: Cli) -> CliResult
{
    match cli.command {
        Commands::Modules { target } => {
            let prog = open_program(&target)?;
            for module in prog.modules() {
                let range = match module.address_range() {
                    Some((start, end)) => format!("{:#x}-{:#x}", start, end),
                    None => "not loaded".to_string(),
                };
                let debug = if module.debug_file().is_some() {
                    "debug info loaded".to_string()
                } else if let Some(err) = module.debug_info_error() {
                    format!("debug info failed: {err}")
                } else {
                    "no debug info".to_string()
                };
                println!("{:<20} {:<24} {} ({})", module.kind().to_string(), range, module.name(), debug);
            }
            Ok(())
        }
        Commands::Threads { target } => {
            let prog = open_program(&target)?;
            for thread in prog.threads() {
                let marker = if thread.crashed { " (crashed)" } else { "" };
                match thread.pc {
                    Some(pc) => println!("{:<8} pc={}{}", thread.tid.raw(), pc, marker),
                    None => println!("{:<8} (no registers){}", thread.tid.raw(), marker),
                }
            }
            Ok(())
        }
        Commands::Symbol { target, query } => {
            let prog = open_program(&target)?;
            let symbol = if query.starts_with("0x") || query.starts_with("0X") {
                prog.symbol_by_address(Address::new(parse_address(&query)?))?
            } else {
                prog.symbol_by_name(&query)?
            };
            println!(
                "{} @ {} size {} ({:?} {:?})",
                symbol.display_name(),
                symbol.address,
                symbol.size,
                symbol.binding,
                symbol.kind
            );
            Ok(())
        }
        Commands::Type { target, name, filename } => {
            let prog = open_program(&target)?;
            let found = prog.find_type(&name, filename.as_deref())?;
            match found.info.size {
                Some(size) => println!("{} ({:?}, {} bytes)", found, found.info.kind, size),
                None => println!("{} ({:?}, size unknown)", found, found.info.kind),
            }
            Ok(())
        }
        Commands::Object { target, name, filename } => {
            let prog = open_program(&target)?;
            let object = prog.find_object(&name, filename.as_deref(), FindObjectFlags::ANY)?;
            println!("{}", object);
            Ok(())
        }
        Commands::Trace { target, tid } => {
            let prog = open_program(&target)?;
            let thread = match tid {
                Some(tid) => prog.thread(ThreadId(tid))?,
                None => prog.main_thread()?,
            };
            let trace = prog.stack_trace(thread.tid)?;
            if trace.is_empty() {
                println!("thread {} has no captured registers to unwind", thread.tid.raw());
            } else {
                print!("{}", trace);
            }
            Ok(())
        }
        Commands::Read { target, address, length } => {
            let prog = open_program(&target)?;
            let start = parse_address(&address)?;
            let bytes = prog.read(Address::new(start), length, AddressSpace::Virtual)?;
            for (row, chunk) in bytes.chunks(16).enumerate() {
                let offset = start + (row as u64) * 16;
                let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
                let ascii: String = chunk
                    .iter()
                    .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
                    .collect();
                println!("{offset:#018x}  {:<47}  |{ascii}|", hex.join(" "));
            }
            Ok(())
        }
    }
}
