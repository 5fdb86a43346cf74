//! DCPU-16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `dcpu-emu run <program>` - Run an image or assembly file in real time
//! - `dcpu-emu asm <source>` - Assemble to an image
//! - `dcpu-emu disasm <image>` - Disassemble an image
//! - `dcpu-emu bench` - Tick many independent cores per cycle

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use dcpu::asm::disasm::disassemble;
use dcpu::host::{Host, ObserverRegistry, Pacer, ShutdownSignal, StopReason, TickStats};
use dcpu::{assemble, load_image, save_image, Cpu, EmuConfig};

#[derive(Parser)]
#[command(name = "dcpu-emu")]
#[command(version)]
#[command(about = "An emulator of the DCPU-16 virtual processor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program in real time until an observer or Ctrl-C stops it
    Run {
        /// Image (.hex or binary) or assembly (.asm, .dasm) file
        program: PathBuf,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Target tick frequency in Hz
        #[arg(long)]
        hz: Option<f64>,
        /// Attach an observer by name (repeatable)
        #[arg(short, long = "observer")]
        observers: Vec<String>,
        /// Stop after this many cycles
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Load address for the program
        #[arg(short, long, value_parser = parse_word)]
        base: Option<u16>,
        /// Write the final CPU state as JSON
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output image; `.hex` and `.txt` are written as hex text
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the image
        image: PathBuf,
    },
    /// Tick many independent cores per cycle and report timing
    Bench {
        /// Number of cores
        #[arg(long, default_value_t = 500)]
        cores: usize,
        /// Target cycle frequency in Hz
        #[arg(long, default_value_t = 100.0)]
        hz: f64,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Report average cycle time every this many cycles
        #[arg(long, default_value_t = 100)]
        report_interval: u64,
        /// Program loaded into every core
        program: Option<PathBuf>,
    },
    /// List the available observers
    Observers,
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("DCPU_LOG", "info")
        .write_style_or("DCPU_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            config,
            hz,
            observers,
            max_cycles,
            base,
            dump,
        } => {
            let mut config = match config {
                Some(path) => EmuConfig::load(&path)
                    .with_context(|| format!("failed to load config {:?}", path))?,
                None => EmuConfig::default(),
            };
            if let Some(hz) = hz {
                config.frequency_hz = hz;
            }
            if let Some(base) = base {
                config.base_address = base;
            }
            for name in &observers {
                config.add_observer(name);
            }
            if let Some(limit) = max_cycles {
                config.max_cycles = Some(limit);
                config.add_observer("cycle-limit");
            }
            config.validate()?;
            run_program(&program, &config, dump.as_deref())
        }
        Commands::Asm { source, output } => assemble_file(&source, output),
        Commands::Disasm { image } => disassemble_file(&image),
        Commands::Bench {
            cores,
            hz,
            cycles,
            report_interval,
            program,
        } => bench(cores, hz, cycles, report_interval, program.as_deref()),
        Commands::Observers => {
            for name in ObserverRegistry::with_builtins().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn parse_word(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", s, e))
}

fn is_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("asm") | Some("dasm") | Some("dasm16")
    )
}

/// Load a program, assembling it first if it is source text.
fn load_program(path: &Path) -> Result<Vec<u16>> {
    if is_source(path) {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {:?}", path))?;
        let words = assemble(&source).with_context(|| format!("failed to assemble {:?}", path))?;
        info!("assembled {} words from {:?}", words.len(), path);
        Ok(words)
    } else {
        let words = load_image(path).with_context(|| format!("failed to load {:?}", path))?;
        info!("loaded {} words from {:?}", words.len(), path);
        Ok(words)
    }
}

/// Raise `signal` on Ctrl-C.
fn install_ctrlc(signal: &ShutdownSignal) -> Result<()> {
    let signal = signal.clone();
    ctrlc::set_handler(move || {
        signal.request();
    })
    .context("failed to install Ctrl-C handler")
}

fn run_program(path: &Path, config: &EmuConfig, dump: Option<&Path>) -> Result<()> {
    let words = load_program(path)?;
    if words.is_empty() {
        bail!("no words to execute in {:?}", path);
    }

    let mut cpu = Cpu::with_memory_size(config.memory_size)?;
    cpu.load(&words, config.base_address)
        .context("failed to load program")?;
    cpu.set_pc(config.base_address);

    let observers = ObserverRegistry::with_builtins().create_all(config)?;
    if observers.is_empty() {
        warn!("no observers attached; only Ctrl-C will stop the emulator");
    }

    let signal = ShutdownSignal::new();
    install_ctrlc(&signal)?;

    let host = Host::builder(cpu)
        .frequency(config.frequency_hz)
        .report_interval(config.report_interval)
        .observers(observers)
        .signal(signal)
        .build()?;
    let cpu = host.cpu();

    let summary = host.run().context("emulator stopped with a fatal error")?;

    let cpu = cpu
        .lock()
        .map_err(|_| anyhow::anyhow!("cpu state poisoned"))?;

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles:    {}", summary.cycles);
    println!("Elapsed:   {:?} ({:.1} Hz)", summary.elapsed, summary.frequency());
    match &summary.reason {
        StopReason::Signal => println!("Stopped:   interrupted"),
        StopReason::Observer(name) => println!("Stopped:   by {}", name),
    }
    println!("{}", cpu.regs);

    if let Some(dump) = dump {
        let json = serde_json::to_string_pretty(&*cpu).context("failed to serialize state")?;
        std::fs::write(dump, json).with_context(|| format!("failed to write {:?}", dump))?;
        println!("✓ State written to {:?}", dump);
    }

    Ok(())
}

fn assemble_file(source: &Path, output: Option<PathBuf>) -> Result<()> {
    let out_path = output.unwrap_or_else(|| source.with_extension("bin"));

    let text = std::fs::read_to_string(source)
        .with_context(|| format!("failed to read {:?}", source))?;
    let words = assemble(&text).context("assembly failed")?;
    println!("✓ Assembled {} words", words.len());

    save_image(&out_path, &words).with_context(|| format!("failed to write {:?}", out_path))?;
    println!("✓ Saved to {:?}", out_path);

    Ok(())
}

fn disassemble_file(path: &Path) -> Result<()> {
    let words = load_image(path).with_context(|| format!("failed to load {:?}", path))?;
    print!("{}", disassemble(&words));
    Ok(())
}

fn bench(
    cores: usize,
    hz: f64,
    cycles: Option<u64>,
    report_interval: u64,
    program: Option<&Path>,
) -> Result<()> {
    let words = match program {
        Some(path) => load_program(path)?,
        None => Vec::new(),
    };

    let mut cpus = Vec::with_capacity(cores);
    for _ in 0..cores {
        let mut cpu = Cpu::new();
        cpu.load(&words, 0)?;
        cpus.push(cpu);
    }

    let pacer = Pacer::new(hz)?;
    let signal = ShutdownSignal::new();
    install_ctrlc(&signal)?;

    info!("ticking {} cores at {} Hz", cores, hz);
    let mut stats = TickStats::new(report_interval);
    let mut done = 0;

    while !signal.is_requested() && cycles.map_or(true, |limit| done < limit) {
        let start = Instant::now();
        for cpu in cpus.iter_mut() {
            cpu.tick()?;
        }
        let elapsed = start.elapsed();
        done += 1;

        if let Some(summary) = stats.record(elapsed) {
            println!(
                "Took {:?} total, with an average of {:?} ({:.0} Hz possible)",
                summary.total,
                summary.average,
                summary.max_hz()
            );
        }

        pacer.pace(elapsed, &signal);
    }

    println!("✓ Ran {} cycles on {} cores", done, cores);
    Ok(())
}
