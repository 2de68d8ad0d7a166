//! The `lasm` command-line frontend
//!
//! Reads an input file, assembles it, and writes a binary plus (optionally)
//! a symbols listing, following the flag surface and exit-code convention
//! laid out in spec.md §6. Grounded on the sibling `vasm` CLI's shape (read
//! input -> assemble -> write output file(s), reporting `Display`-formatted
//! errors to stderr) but built on `clap`'s derive macros rather than
//! `clap::Arg` builders.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use lasm::assembler::{assemble_from_file, CpuTarget, Settings};
use lasm::logging;

#[derive(ClapParser)]
#[command(name = "lasm", about = "A multi-pass macro assembler for 8/16-bit retro CPUs")]
struct Cli {
    /// Source file to assemble
    input: PathBuf,

    /// Output binary path (defaults to the input path with its extension replaced by `.bin`)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Symbols listing output path
    #[arg(short = 's', long = "symbols")]
    symbols: Option<PathBuf>,

    /// Target CPU family
    #[arg(short = 'c', long = "cpu", default_value = "6502")]
    cpu: String,

    /// Prefix used for hexadecimal values in the symbols listing
    #[arg(long = "hp", default_value = "0x")]
    hex_prefix: String,

    /// Prefix used for binary values in the symbols listing
    #[arg(long = "bp", default_value = "0b")]
    bin_prefix: String,

    /// Delimiter joining nested scope names in the symbols listing
    #[arg(long = "dp", default_value = ".")]
    delimiter: String,

    /// Stop at the first error instead of collecting all of them
    #[arg(long = "abort-on-error")]
    abort_on_error: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cpu = match CpuTarget::parse(&cli.cpu) {
        Some(cpu) => cpu,
        None => {
            logging::error(format!("unknown CPU target \"{}\"", cli.cpu));
            return ExitCode::from(config_error_code());
        }
    };

    let settings = Settings {
        cpu,
        hex_prefix: cli.hex_prefix,
        bin_prefix: cli.bin_prefix,
        delimiter: cli.delimiter,
        abort_on_error: cli.abort_on_error,
        passes: 2,
    };

    let input_path = match cli.input.to_str() {
        Some(s) => s,
        None => {
            logging::error("input path is not valid UTF-8".to_string());
            return ExitCode::from(config_error_code());
        }
    };

    let output = match assemble_from_file(input_path, &settings) {
        Ok(output) => output,
        Err(err) => {
            eprint!("{err}");
            return ExitCode::from(err.kind.exit_code() as u8);
        }
    };

    let output_path = cli.output.unwrap_or_else(|| cli.input.with_extension("bin"));
    if let Err(e) = fs::write(&output_path, &output.binary) {
        logging::error(format!("failed to write {}: {e}", output_path.display()));
        return ExitCode::from(config_error_code());
    }

    if let Some(symbols_path) = cli.symbols {
        if let Err(e) = fs::write(&symbols_path, &output.symbols) {
            logging::error(format!("failed to write {}: {e}", symbols_path.display()));
            return ExitCode::from(config_error_code());
        }
    }

    logging::info(format!("wrote {} ({} bytes)", output_path.display(), output.binary.len()));
    ExitCode::from(0)
}

/// `-1` is not representable as a process exit status on most platforms,
/// so fatal configuration errors use `1` instead (spec.md §6).
fn config_error_code() -> u8 {
    1
}
