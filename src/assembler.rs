/*!
  The two-pass driver.

  The first pass compiles every line, hands each instruction the offset it will occupy
  in the output, and binds every label to the offset of the instruction that follows it.
  Instruction sizes never depend on label values, since a jump target is always one
  byte, so one pass is enough to know every offset. The second pass fills in the jump
  targets and concatenates the bytes behind the version header.
*/

use std::convert::TryFrom;

use string_cache::DefaultAtom;

use crate::bytecode::{
  compile_line, CompiledInstruction, InstructionSet, ParsedLine, MAX_PROGRAM_SIZE, VERSION_HEADER
};
use crate::error::AssemblyError;
use crate::symboltable::SymbolTable;

/// Knobs for one `Assembler`. The defaults are what new programs should use.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
  /**
    Emit `sleep_match_all_timeout` and `sleep_match_any_timeout` the way the first
    generation of tools did, with the low opcode nibble measured from the timeout token
    instead of the bitmask. Only needed to reproduce existing binaries bit for bit.
  */
  pub legacy_timeout_bitmask_count: bool,
  /// Fail when a label name is declared twice instead of letting the later one win.
  pub strict_labels: bool,
}

impl Options {
  pub fn instruction_set(&self) -> InstructionSet {
    match self.legacy_timeout_bitmask_count {
      true  => InstructionSet::Legacy,
      false => InstructionSet::Current
    }
  }
}

/// One row of a program's listing, in source order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ListingEntry {
  Label {
    line: usize,
    name: DefaultAtom,
    offset: usize
  },
  Instruction {
    line: usize,
    offset: usize,
    bytes: Vec<u8>,
    source: String
  },
}

/// An assembled program: the byte stream for the device and the listing it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program {
  bytes: Vec<u8>,
  entries: Vec<ListingEntry>,
}

impl Program {
  /// The complete stream, version header first.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.bytes
  }

  pub fn entries(&self) -> &[ListingEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }
}

impl AsRef<[u8]> for Program {
  fn as_ref(&self) -> &[u8] {
    &self.bytes
  }
}

enum Placed {
  Label {
    line: usize,
    name: DefaultAtom,
    offset: usize
  },
  Instruction {
    offset: usize,
    instruction: CompiledInstruction
  },
}

struct FirstPass {
  placed: Vec<Placed>,
  symbols: SymbolTable,
  size: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Assembler {
  options: Options,
}

impl Assembler {

  pub fn new() -> Assembler {
    Assembler::default()
  }

  pub fn with_options(options: Options) -> Assembler {
    Assembler { options }
  }

  /// Assembles a whole program. Either every line assembles or nothing is returned.
  pub fn assemble(&self, source: &str) -> Result<Program, AssemblyError> {
    let first_pass = self.first_pass(source)?;
    let program = self.second_pass(first_pass)?;

    #[cfg(feature = "trace_assembly")]
    eprintln!("Assembled {} of at most {} bytes.", program.len(), MAX_PROGRAM_SIZE);

    Ok(program)
  }

  fn first_pass(&self, source: &str) -> Result<FirstPass, AssemblyError> {
    let instruction_set = self.options.instruction_set();
    let mut symbols = SymbolTable::new(self.options.strict_labels);
    let mut placed = Vec::new();
    let mut offset = VERSION_HEADER.len();

    for (index, text) in source.lines().enumerate() {
      let line = index + 1;

      match compile_line(text, line, instruction_set)? {

        ParsedLine::Blank => {}

        ParsedLine::Label(name) => {
          #[cfg(feature = "trace_assembly")]
          eprintln!("{:>5} | {:03} label {}", line, offset, name);

          symbols.declare(name.clone(), offset, line)?;
          placed.push(Placed::Label { line, name, offset });
        }

        ParsedLine::Instruction(instruction) => {
          #[cfg(feature = "trace_assembly")]
          eprintln!("{:>5} | {:03} {} ({} bytes)", line, offset, instruction.source, instruction.encoding.len());

          let size = instruction.encoding.len();
          placed.push(Placed::Instruction { offset, instruction });
          offset += size;
        }

      }
    }

    Ok(FirstPass { placed, symbols, size: offset })
  }

  fn second_pass(&self, first_pass: FirstPass) -> Result<Program, AssemblyError> {
    let FirstPass { placed, symbols, size } = first_pass;

    let mut bytes = Vec::with_capacity(size);
    bytes.extend_from_slice(&VERSION_HEADER);
    let mut entries = Vec::with_capacity(placed.len());

    for item in placed {
      match item {

        Placed::Label { line, name, offset } => {
          entries.push(ListingEntry::Label { line, name, offset });
        }

        Placed::Instruction { offset, instruction } => {
          let CompiledInstruction { line, source, encoding, .. } = instruction;
          let target =
            match encoding.pending_label() {
              Some(label) => {
                let target = symbols.resolve(label, line)?;

                #[cfg(feature = "trace_assembly")]
                eprintln!("{:>5} | {:03} {} -> {}", line, offset, label, target);

                // A target past one byte means the program is far beyond the limit anyway.
                u8::try_from(target).map_err(|_| AssemblyError::ProgramTooLarge { size })?
              }
              None => 0
            };

          let resolved = encoding.resolve(target);
          bytes.extend_from_slice(&resolved);
          entries.push(ListingEntry::Instruction { line, offset, bytes: resolved, source });
        }

      }
    }

    if bytes.len() > MAX_PROGRAM_SIZE {
      return Err(AssemblyError::ProgramTooLarge { size: bytes.len() });
    }

    Ok(Program { bytes, entries })
  }
}
