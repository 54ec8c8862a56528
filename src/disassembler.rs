/*!
  Turns an assembled stream back into assembly.

  The opcode byte says how many bytes follow it: analog writes take two, varints end at
  the first byte without a continuation bit, jump targets take one, and pin bitmasks take
  as many as the opcode's low nibble says. Streams produced with the legacy timeout
  encoding cannot be read back reliably, because their low nibble does not describe the
  bitmask.

  Jump targets become labels named `l<offset>`. Bitmask bytes decode to four symbols each,
  with don't care pins written as `x`, so padding shows up as trailing `x`s. The
  generated source assembles to the same bytes.
*/

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::bytecode::{
  decode_pin_bits, decode_u16, decode_varint, ArgumentKind, Opcode, VERSION_HEADER
};
use crate::error::DisassemblyError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
  PinBitmask(String),
  Uint16(u16),
  Varint(u64),
  JumpTarget(u8),
}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operand::PinBitmask(states) => write!(f, "{}", states),
      Operand::Uint16(value) => write!(f, "{}", value),
      Operand::Varint(value) => write!(f, "{}", value),
      Operand::JumpTarget(offset) => write!(f, "{}", label_name(*offset))
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisassembledInstruction {
  pub offset: usize,
  pub opcode: Opcode,
  pub operands: Vec<Operand>,
  /// Length in bytes, opcode included.
  pub size: usize,
}

impl Display for DisassembledInstruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.opcode)?;
    for operand in &self.operands {
      write!(f, " {}", operand)?;
    }
    Ok(())
  }
}

fn label_name(offset: u8) -> String {
  format!("l{}", offset)
}

fn decode_instruction(stream: &[u8], offset: usize)
  -> Result<DisassembledInstruction, DisassemblyError>
{
  let byte = stream[offset];
  let opcode = Opcode::from_opcode_byte(byte)
    .ok_or(DisassemblyError::UnknownOpcode { offset, byte })?;
  let pin_bytes = (byte & 0x0F) as usize;
  let truncated = DisassemblyError::Truncated { offset, opcode };

  let mut cursor = offset + 1;
  let mut operands = Vec::new();
  for kind in opcode.definition().arguments {
    let rest = &stream[cursor..];
    let (operand, size) =
      match kind {
        ArgumentKind::PinBitmask => {
          if pin_bytes == 0 {
            return Err(DisassemblyError::UnknownOpcode { offset, byte });
          }
          let packed = rest.get(..pin_bytes).ok_or_else(|| truncated.clone())?;
          (Operand::PinBitmask(decode_pin_bits(packed)), pin_bytes)
        }
        ArgumentKind::Uint16 => {
          let value = decode_u16(rest).ok_or_else(|| truncated.clone())?;
          (Operand::Uint16(value), 2)
        }
        ArgumentKind::Varint => {
          let (value, size) = decode_varint(rest).ok_or_else(|| truncated.clone())?;
          (Operand::Varint(value), size)
        }
        ArgumentKind::JumpLabel => {
          let target = *rest.first().ok_or_else(|| truncated.clone())?;
          (Operand::JumpTarget(target), 1)
        }
      };
    operands.push(operand);
    cursor += size;
  }

  Ok(DisassembledInstruction { offset, opcode, operands, size: cursor - offset })
}

/// Decodes every instruction of an assembled stream, checking that each jump lands on an
/// instruction or on the end of the stream.
pub fn disassemble(stream: &[u8]) -> Result<Vec<DisassembledInstruction>, DisassemblyError> {
  if !stream.starts_with(&VERSION_HEADER) {
    return Err(DisassemblyError::MissingHeader);
  }

  let mut instructions = Vec::new();
  let mut offset = VERSION_HEADER.len();
  while offset < stream.len() {
    let instruction = decode_instruction(stream, offset)?;
    offset += instruction.size;
    instructions.push(instruction);
  }

  let boundaries: BTreeSet<usize> = instructions.iter()
    .map(|instruction| instruction.offset)
    .chain(std::iter::once(stream.len()))
    .collect();
  for instruction in &instructions {
    for operand in &instruction.operands {
      if let Operand::JumpTarget(target) = operand {
        if !boundaries.contains(&(*target as usize)) {
          return Err(DisassemblyError::MisalignedJump { offset: instruction.offset, target: *target });
        }
      }
    }
  }

  Ok(instructions)
}

/// Disassembles a stream into assembly source, one instruction or label per line.
pub fn disassemble_to_source(stream: &[u8]) -> Result<String, DisassemblyError> {
  let instructions = disassemble(stream)?;

  let targets: BTreeSet<u8> = instructions.iter()
    .flat_map(|instruction| instruction.operands.iter())
    .filter_map(|operand| match operand {
      Operand::JumpTarget(target) => Some(*target),
      _ => None
    })
    .collect();

  let mut source = String::new();
  let declare = |source: &mut String, offset: usize| {
    if offset <= u8::max_value() as usize && targets.contains(&(offset as u8)) {
      source.push_str(&format!("label {}\n", label_name(offset as u8)));
    }
  };

  for instruction in &instructions {
    declare(&mut source, instruction.offset);
    source.push_str(&format!("{}\n", instruction));
  }
  declare(&mut source, stream.len());

  Ok(source)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembler::Assembler;

  fn assemble(source: &str) -> Vec<u8> {
    Assembler::new().assemble(source).unwrap().into_bytes()
  }

  #[test]
  fn requires_header() {
    assert_eq!(disassemble(&[0x70, 0x02]), Err(DisassemblyError::MissingHeader));
    assert_eq!(disassemble(&[]), Err(DisassemblyError::MissingHeader));
    assert_eq!(disassemble(&VERSION_HEADER), Ok(vec![]));
  }

  #[test]
  fn decodes_operands() {
    let instructions = disassemble(&assemble("write_analog_channel_3 1000\nsleep_ms 300\nwrite_digital 01i0")).unwrap();
    assert_eq!(
      instructions,
      vec![
        DisassembledInstruction {
          offset: 2, opcode: Opcode::WriteAnalogChannel3, operands: vec![Operand::Uint16(1000)], size: 3
        },
        DisassembledInstruction {
          offset: 5, opcode: Opcode::SleepMs, operands: vec![Operand::Varint(300)], size: 3
        },
        DisassembledInstruction {
          offset: 8, opcode: Opcode::WriteDigital, operands: vec![Operand::PinBitmask("01i0".to_string())], size: 2
        },
      ]
    );
  }

  #[test]
  fn source_reassembles() {
    let expected = assemble(
      "label top\n\
       sleep_match_any_timeout 10i 250\n\
       jump_match_all end 000011\n\
       jump_count top 3\n\
       write_analog_channel_11 65535\n\
       jump top\n\
       label end\n"
    );
    let source = disassemble_to_source(&expected).unwrap();
    assert!(source.starts_with("label l2\nsleep_match_any_timeout 10ix 250\n"));
    assert!(source.ends_with("jump l2\nlabel l18\n"));
    assert_eq!(assemble(&source), expected);
  }

  #[test]
  fn rejects_bad_streams() {
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x85]),
      Err(DisassemblyError::UnknownOpcode { offset: 2, byte: 0x85 })
    );
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x71, 0x02]),
      Err(DisassemblyError::UnknownOpcode { offset: 2, byte: 0x71 })
    );
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x00]),
      Err(DisassemblyError::UnknownOpcode { offset: 2, byte: 0x00 })
    );
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x20, 0x81]),
      Err(DisassemblyError::Truncated { offset: 2, opcode: Opcode::SleepMs })
    );
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x02, 0xFF]),
      Err(DisassemblyError::Truncated { offset: 2, opcode: Opcode::WriteDigital })
    );
    assert_eq!(
      disassemble(&[0x80, 0x00, 0x20, 0x01, 0x70, 0x03]),
      Err(DisassemblyError::MisalignedJump { offset: 4, target: 3 })
    );
  }
}
