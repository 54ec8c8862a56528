use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use gpioasm::listing::hex_bytes;
use gpioasm::{assemble_file_with, Options};

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
  /// Bracketed list of decimal bytes, e.g. `[128, 0, 192]`
  List,
  /// Space separated hex bytes
  Hex,
  /// The bytes themselves
  Raw,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Assembles gpioASM source into device bytecode")]
struct Opts {
  /// Assembly source, one instruction per line
  input: PathBuf,
  /// How to print the assembled program
  #[arg(short, long, value_enum, default_value_t = Format::List)]
  format: Format,
  /// Write the program here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,
  /// Print a listing of offsets, bytes, and source lines to stderr
  #[arg(short, long)]
  listing: bool,
  /// Fail if a label is declared more than once
  #[arg(long)]
  strict_labels: bool,
  /// Encode the timeout sleeps the way the first generation of tools did
  #[arg(long)]
  legacy_timeout: bool,
}

fn render(bytes: &[u8], format: Format) -> Vec<u8> {
  match format {
    Format::List => {
      let list = bytes.iter().map(u8::to_string).collect::<Vec<String>>().join(", ");
      format!("[{}]\n", list).into_bytes()
    }
    Format::Hex => format!("{}\n", hex_bytes(bytes)).into_bytes(),
    Format::Raw => bytes.to_vec()
  }
}

fn main() -> Result<()> {
  let opts = Opts::parse();
  let options = Options {
    legacy_timeout_bitmask_count: opts.legacy_timeout,
    strict_labels: opts.strict_labels,
  };

  let program = assemble_file_with(&opts.input, options)
    .with_context(|| format!("failed to assemble {}", opts.input.display()))?;

  if opts.listing {
    eprintln!("{}", program.listing());
  }

  let rendered = render(program.bytes(), opts.format);
  match &opts.output {
    Some(path) => fs::write(path, &rendered)
      .with_context(|| format!("failed to write {}", path.display()))?,
    None => io::stdout().write_all(&rendered).context("failed to write to stdout")?
  }

  Ok(())
}
