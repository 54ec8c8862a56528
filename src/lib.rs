/*!
  An assembler for gpioASM, the instruction language of a small pin-control virtual
  machine. A program drives and samples digital pins, writes analog channels, sleeps, and
  branches on pin state:

  ```text
  label blink
  write_digital 1
  sleep_ms 500
  write_digital 0
  sleep_match_any_timeout 1 500
  jump_match_all blink 0
  exit
  ```

  One instruction per line, tokens separated by whitespace, case-insensitive, and
  `label <name>` marks a jump target. The output is a byte stream of at most 127 bytes
  that starts with a two byte version header.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;
extern crate strum;
extern crate strum_macros;

pub mod assembler;
pub mod bytecode;
pub mod disassembler;
pub mod error;
pub mod listing;
pub mod symboltable;

use std::fs;
use std::path::Path;

pub use assembler::{Assembler, ListingEntry, Options, Program};
pub use disassembler::{disassemble, disassemble_to_source, DisassembledInstruction, Operand};
pub use error::{AssemblyError, DisassemblyError, EncodingError, FileError};

/// Assembles `source` with the default options.
pub fn assemble(source: &str) -> Result<Program, AssemblyError> {
  Assembler::new().assemble(source)
}

/// Reads a source file and assembles it with `options`.
pub fn assemble_file_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Program, FileError> {
  let path = path.as_ref();
  let source = fs::read_to_string(path).map_err(|source| {
    FileError::Io { path: path.to_path_buf(), source }
  })?;
  Ok(Assembler::with_options(options).assemble(&source)?)
}

/// Reads a source file and assembles it with the default options.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Program, FileError> {
  assemble_file_with(path, Options::default())
}
