//! Minimal CLI: loads a ROM and an optional SNA snapshot, then runs frames
//! headlessly. The host display/event loop this would normally drive is
//! out of scope here; this binary exists to exercise the core end to end.

use std::path::PathBuf;
use std::process;

use zx_spectrum::Machine;

struct CliArgs {
    rom_path: PathBuf,
    sna_path: Option<PathBuf>,
    frames: u32,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut rom_path = None;
    let mut sna_path = None;
    let mut frames = 1u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                rom_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    frames = s.parse().unwrap_or(1);
                }
            }
            "--help" | "-h" => {
                eprintln!("Usage: zx-spectrum --rom <file> [snapshot.sna] [--frames <n>]");
                process::exit(0);
            }
            other if !other.starts_with('-') => {
                sna_path = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(rom_path) = rom_path else {
        eprintln!("missing required --rom <file>");
        process::exit(1);
    };

    CliArgs { rom_path, sna_path, frames }
}

fn main() {
    let cli = parse_args();

    let rom = std::fs::read(&cli.rom_path).unwrap_or_else(|err| {
        eprintln!("failed to read ROM {}: {err}", cli.rom_path.display());
        process::exit(1);
    });

    let mut machine = Machine::new();
    if let Err(err) = machine.load_rom(&rom) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Some(sna_path) = &cli.sna_path {
        let data = std::fs::read(sna_path).unwrap_or_else(|err| {
            eprintln!("failed to read snapshot {}: {err}", sna_path.display());
            process::exit(1);
        });
        if let Err(err) = machine.load_sna(&data) {
            eprintln!("{err}");
            process::exit(1);
        }
    }

    for _ in 0..cli.frames {
        machine.run_frame();
    }

    // A host-signaled interrupt exits cleanly via the shell's default
    // 128+SIGINT=130 exit code; there is no partial-instruction recovery
    // to perform since run_frame only returns between whole instructions.
    process::exit(0);
}
