//! Every way assembling, reading, or disassembling a program can fail. Each failure is its
//! own variant so that tools can report the cause and the line separately.

use std::io;
use std::path::PathBuf;

use string_cache::DefaultAtom;
use thiserror::Error;

use crate::bytecode::{Opcode, MAX_PROGRAM_SIZE};

/// A single argument token could not be encoded.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EncodingError {
  #[error("`{0}` is not an integer")]
  InvalidInteger(String),
  #[error("can only encode non-negative integers to varint, got {0}")]
  NegativeVarint(String),
  #[error("{value} is outside the range 0..={max}")]
  OutOfRange { value: i64, max: u64 },
  #[error("pin bitmask `{0}` does not fit in 15 bytes")]
  BitmaskTooLong(String),
  #[error("`{token}` packs into {bytes} bytes, more than the opcode's low nibble can count")]
  OpcodeCountTooLarge { token: String, bytes: usize },
}

/// Fatal errors of one assembly run. Line numbers are 1-based.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AssemblyError {
  #[error("line {line}: `{mnemonic}` is not an instruction")]
  UnknownMnemonic { line: usize, mnemonic: String },

  #[error("line {line}: {opcode} requires {expected} arguments but was given {given}")]
  WrongArity { line: usize, opcode: Opcode, expected: usize, given: usize },

  #[error("line {line}: a label declaration takes exactly one name but was given {given}")]
  MalformedLabel { line: usize, given: usize },

  #[error("line {line}: label `{label}` was already declared on line {first_line}")]
  DuplicateLabel { line: usize, label: DefaultAtom, first_line: usize },

  #[error("line {line}: label `{label}` is not declared")]
  UndeclaredLabel { line: usize, label: DefaultAtom },

  #[error("line {line}: {source}")]
  Encoding {
    line: usize,
    #[source]
    source: EncodingError
  },

  #[error("program is {size} bytes but the device holds at most {} bytes", MAX_PROGRAM_SIZE)]
  ProgramTooLarge { size: usize },
}

impl AssemblyError {
  /// The offending source line, if the error belongs to one.
  pub fn line_number(&self) -> Option<usize> {
    match self {
      AssemblyError::UnknownMnemonic { line, .. }
      | AssemblyError::WrongArity { line, .. }
      | AssemblyError::MalformedLabel { line, .. }
      | AssemblyError::DuplicateLabel { line, .. }
      | AssemblyError::UndeclaredLabel { line, .. }
      | AssemblyError::Encoding { line, .. } => Some(*line),
      AssemblyError::ProgramTooLarge { .. } => None
    }
  }
}

#[derive(Debug, Error)]
pub enum FileError {
  #[error("could not read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error
  },
  #[error(transparent)]
  Assembly(#[from] AssemblyError),
}

/// Failures while turning an assembled stream back into source text. Offsets are byte
/// positions in the stream, header included.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DisassemblyError {
  #[error("stream does not start with the version header")]
  MissingHeader,
  #[error("offset {offset}: 0x{byte:02x} is not an opcode")]
  UnknownOpcode { offset: usize, byte: u8 },
  #[error("offset {offset}: {opcode} runs past the end of the stream")]
  Truncated { offset: usize, opcode: Opcode },
  #[error("offset {offset}: jump target {target} is not the start of an instruction")]
  MisalignedJump { offset: usize, target: u8 },
}
