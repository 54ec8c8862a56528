/*!

  The device reads a program as a flat byte stream:

    Header:       0x80 0x00        (version check)
    Instruction:  [Opcode:8][Arguments:0..]

  and refuses any program longer than 127 bytes, the size of the memory region it is
  loaded into. Instructions are variable width. The opcode byte alone tells the device
  how to read what follows: the high nibble selects the operation, and for operations
  that carry a pin bitmask the low nibble is the number of bitmask bytes. Arguments are
  pin bitmasks, 16 bit analog values, varints, and single byte jump targets, which are
  absolute offsets into the stream (header included).

  One design decision that needed to be made is whether to model each instruction as an
  enum variant carrying its own arguments. The instruction set is closed and every
  mnemonic is fully described by its base opcode, the ordered kinds of its arguments, and
  where its dynamic opcode bits come from. So the enum is only used for the opcode, and a
  small `InstructionDefinition` describes the rest as data.

*/

mod assembly;
mod binary;
mod instruction;

pub use assembly::{
  compile_line, compile_tokens, encode_varint_literal, parse_integer, tokenize,
  CompiledInstruction, Encoding, ParsedLine, LABEL_KEYWORD
};
pub use binary::{
  decode_pin_bits, decode_u16, decode_varint, encode_pin_bits, encode_u16, encode_varint,
  pin_byte_count, MAX_PIN_BYTES, PINS_PER_BYTE
};
pub use instruction::{ArgumentKind, DynamicOpcode, InstructionDefinition, InstructionSet, Opcode};

/// Every program starts with these bytes.
pub const VERSION_HEADER: [u8; 2] = [0x80, 0x00];
/// The largest program the device accepts, header included.
pub const MAX_PROGRAM_SIZE: usize = 127;
