use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;
use miette::{bail, IntoDiagnostic, Result};

use lc3vm::io::StdConsole;
use lc3vm::output::{listing, RegisterDump};
use lc3vm::{
    env, reader, words_from_bytes, Air, Features, ImageLoadError, MemoryImage, RunState, Status,
};

/// lc3vm is a virtual machine and assembler for the LC3 instruction set.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` or `.obj` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.obj`/`.lc3` file and output to terminal
    Run {
        /// `.asm`, `.obj` or `.lc3` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Compatibility features, eg. `source-cc,plain-puts`
        #[arg(long)]
        features: Option<Features>,
        /// Stop with an error after this many instructions
        #[arg(long)]
        step_limit: Option<u64>,
        /// Print registers once the program halts
        #[arg(short, long)]
        registers: bool,
    },
    /// Create binary `.obj` file to run later
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination to output `.obj` file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the instructions of a binary image
    Disasm {
        /// `.obj` or `.lc3` file to disassemble
        name: PathBuf,
    },
}

/// Options for a single run.
#[derive(Default)]
struct RunOptions {
    minimal: bool,
    features: Option<Features>,
    step_limit: Option<u64>,
    registers: bool,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    env_logger::init();
    let args = Args::parse();
    env::init();

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                minimal,
                features,
                step_limit,
                registers,
            } => run(
                &name,
                RunOptions {
                    minimal,
                    features,
                    step_limit,
                    registers,
                },
            ),
            Command::Assemble { name, dest } => {
                file_message(Green, "Assembling", &name);
                let air = assemble(&name)?;
                let out_file_name = dest.unwrap_or_else(|| name.with_extension("obj"));
                fs::write(&out_file_name, air.to_image()).into_diagnostic()?;

                message(Green, "Finished", &format!("emit {} words", air.len()));
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let _ = assemble(&name)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Disasm { name } => {
                let bytes = fs::read(&name).into_diagnostic()?;
                let words = words_from_bytes(&bytes)?;
                let Some((&orig, data)) = words.split_first() else {
                    return Err(ImageLoadError::Empty.into());
                };
                print!("{}", listing(orig, data));
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, RunOptions::default())
    } else {
        println!("\n~ lc3vm v{VERSION} ~");
        println!("{}", LOGO.truecolor(120, 200, 255).bold());
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, opts: RunOptions) -> Result<()> {
    let quiet = opts.minimal;
    let mut program = match name.extension().and_then(|ext| ext.to_str()) {
        Some("lc3" | "obj") => {
            if !quiet {
                file_message(MsgColor::Green, "Loading", name);
            }
            let mut mem = MemoryImage::new();
            let orig = mem.load_file(name)?;
            RunState::new(mem, orig, StdConsole)
        }
        Some("asm") => {
            if !quiet {
                file_message(MsgColor::Green, "Assembling", name);
            }
            let air = assemble(name)?;
            RunState::from_air(&air, StdConsole)?
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    let features = opts.features.unwrap_or_else(env::features);
    let step_limit = opts.step_limit.or_else(env::step_limit);
    info!("Running with features `{features}`, step limit {step_limit:?}");
    program = program.with_features(features).with_step_limit(step_limit);

    if !quiet {
        message(MsgColor::Green, "Running", "emitted binary");
    }
    let status = program.run()?;

    if !quiet {
        match status {
            Status::Halted => println!("\n{:>12}", "Halted".cyan()),
            Status::Stopped => println!("\n{:>12}", "Stopped".red()),
            Status::Running => {}
        }
    }
    if opts.registers {
        print!("{}", RegisterDump::new(program.regs(), opts.minimal));
    }
    if !quiet {
        file_message(MsgColor::Green, "Completed", name);
    }
    Ok(())
}

/// Return assembled unit of a source file
fn assemble(name: &Path) -> Result<Air> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    Ok(reader::assemble(&contents)?)
}

const LOGO: &str = r#"
  _       ____   _____
 | |     / ___| |___ /  __   __  _ __ ___
 | |    | |       |_ \  \ \ / / | '_ ` _ \
 | |___ | |___   ___) |  \ V /  | | | | | |
 |_____| \____| |____/    \_/   |_| |_| |_|"#;

const SHORT_INFO: &str = r"
Welcome to lc3vm, a virtual machine and assembler for the LC3 instruction set.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
