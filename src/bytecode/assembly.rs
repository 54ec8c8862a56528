/*!
  The human readable textual form of bytecode is called assembly. This module splits one
  line of assembly into tokens and compiles it, using the `strum` derives of `Opcode` to
  look up mnemonics. Jump targets are left as label names; the assembler fills them in
  once every label has an offset.
*/

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use string_cache::DefaultAtom;
use nom::{
  bytes::complete::{take_till1, take_while},
  character::complete::{digit1, one_of},
  combinator::{all_consuming, opt},
  multi::many0,
  sequence::{pair, preceded, terminated},
  IResult
};

use crate::bytecode::binary::{
  encode_pin_bits, encode_u16, encode_varint, pin_byte_count, MAX_PIN_BYTES
};
use crate::bytecode::{ArgumentKind, InstructionSet, Opcode};
use crate::error::{AssemblyError, EncodingError};

/// The keyword that declares a label instead of an instruction.
pub const LABEL_KEYWORD: &str = "label";

/// The encoded form of one instruction before label offsets are known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
  /// Complete bytes, opcode first.
  Fixed(Vec<u8>),
  /// The offset of `label` goes in the byte between `opcode` and `tail`.
  Pending {
    opcode: u8,
    label: DefaultAtom,
    tail: Vec<u8>
  },
}

impl Encoding {
  /// Size in bytes, counting the unresolved jump target as its final single byte.
  pub fn len(&self) -> usize {
    match self {
      Encoding::Fixed(bytes) => bytes.len(),
      Encoding::Pending { tail, .. } => 2 + tail.len()
    }
  }

  pub fn pending_label(&self) -> Option<&DefaultAtom> {
    match self {
      Encoding::Fixed(_) => None,
      Encoding::Pending { label, .. } => Some(label)
    }
  }

  /// Produces the final bytes. `target` is ignored for fixed encodings.
  pub fn resolve(self, target: u8) -> Vec<u8> {
    match self {
      Encoding::Fixed(bytes) => bytes,
      Encoding::Pending { opcode, tail, .. } => {
        let mut bytes = Vec::with_capacity(2 + tail.len());
        bytes.push(opcode);
        bytes.push(target);
        bytes.extend(tail);
        bytes
      }
    }
  }
}

/// One instruction as produced by the first pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompiledInstruction {
  pub line: usize,
  pub opcode: Opcode,
  /// The normalized tokens of the line, joined by single spaces.
  pub source: String,
  pub encoding: Encoding,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParsedLine {
  Blank,
  Label(DefaultAtom),
  Instruction(CompiledInstruction),
}

impl Display for ParsedLine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ParsedLine::Blank => Ok(()),
      ParsedLine::Label(name) => write!(f, "{} {}", LABEL_KEYWORD, name),
      ParsedLine::Instruction(instruction) => write!(f, "{}", instruction.source)
    }
  }
}

fn token_list(line: &str) -> IResult<&str, Vec<&str>> {
  terminated(
    many0(preceded(take_while(char::is_whitespace), take_till1(char::is_whitespace))),
    take_while(char::is_whitespace)
  )(line)
}

/// Splits a line on runs of whitespace and lowercases every token.
pub fn tokenize(line: &str) -> Vec<String> {
  match token_list(line) {
    Ok((_rest, tokens)) => tokens.into_iter().map(str::to_lowercase).collect(),
    // Neither parser can fail on `&str`: `many0` stops at the first missing token.
    Err(_) => Vec::new()
  }
}

fn integer_literal(input: &str) -> IResult<&str, (Option<char>, &str)> {
  pair(opt(one_of("+-")), digit1)(input)
}

fn split_integer(token: &str) -> Result<(Option<char>, &str), EncodingError> {
  all_consuming(integer_literal)(token)
    .map(|(_rest, parts)| parts)
    .map_err(|_| EncodingError::InvalidInteger(token.to_string()))
}

/// Parses a decimal integer with an optional sign. A value that does not fit in 64 bits
/// is an `InvalidInteger` like any other malformed token.
pub fn parse_integer(token: &str) -> Result<i64, EncodingError> {
  split_integer(token)?;
  token.parse::<i64>().map_err(|_| EncodingError::InvalidInteger(token.to_string()))
}

/// Encodes a decimal literal of any magnitude as a varint. Negative values other than
/// `-0` are rejected.
pub fn encode_varint_literal(token: &str) -> Result<Vec<u8>, EncodingError> {
  let (sign, digits) = split_integer(token)?;
  if sign == Some('-') && digits.bytes().any(|digit| digit != b'0') {
    return Err(EncodingError::NegativeVarint(token.to_string()));
  }
  Ok(encode_varint(digits))
}

/// Compiles one source line. `line` is the 1-based line number used in errors.
pub fn compile_line(text: &str, line: usize, instruction_set: InstructionSet)
  -> Result<ParsedLine, AssemblyError>
{
  compile_tokens(&tokenize(text), line, instruction_set)
}

/**
  Compiles an already tokenized line. Tokens must be lowercase and non-empty, as
  produced by `tokenize`.
*/
pub fn compile_tokens(tokens: &[String], line: usize, instruction_set: InstructionSet)
  -> Result<ParsedLine, AssemblyError>
{
  let (mnemonic, arguments) =
    match tokens.split_first() {
      Some(split) => split,
      None => return Ok(ParsedLine::Blank)
    };

  if mnemonic == LABEL_KEYWORD {
    return match arguments {
      [name] => Ok(ParsedLine::Label(DefaultAtom::from(name.as_str()))),
      _ => Err(AssemblyError::MalformedLabel { line, given: arguments.len() })
    };
  }

  let opcode = Opcode::from_str(mnemonic).map_err(|_| {
    AssemblyError::UnknownMnemonic { line, mnemonic: mnemonic.clone() }
  })?;
  let definition = instruction_set.definition(opcode);

  if arguments.len() != definition.arity() {
    return Err(AssemblyError::WrongArity {
      line,
      opcode,
      expected: definition.arity(),
      given: arguments.len()
    });
  }

  let encoding_error = |source: EncodingError| AssemblyError::Encoding { line, source };

  let mut label = None;
  let mut argument_bytes: Vec<u8> = Vec::new();
  for (kind, argument) in definition.arguments.iter().zip(arguments) {
    match kind {
      ArgumentKind::PinBitmask => {
        if pin_byte_count(argument.chars().count()) > MAX_PIN_BYTES {
          return Err(encoding_error(EncodingError::BitmaskTooLong(argument.clone())));
        }
        argument_bytes.extend(encode_pin_bits(argument));
      }
      ArgumentKind::Uint16 => {
        let value = parse_integer(argument).map_err(encoding_error)?;
        argument_bytes.extend_from_slice(&encode_u16(value).map_err(encoding_error)?);
      }
      ArgumentKind::Varint => {
        argument_bytes.extend(encode_varint_literal(argument).map_err(encoding_error)?);
      }
      // Jump labels are always the first argument, so nothing precedes the target byte.
      ArgumentKind::JumpLabel => label = Some(DefaultAtom::from(argument.as_str())),
    }
  }

  let mut opcode_byte = opcode.code();
  if let Some(dynamic) = definition.dynamic {
    // Only the legacy timeout encoding can get here with a count that overflows, since
    // every bitmask argument was bounded above.
    let count = dynamic.bits(tokens);
    if count > MAX_PIN_BYTES {
      let token = tokens[dynamic.token()].clone();
      return Err(encoding_error(EncodingError::OpcodeCountTooLarge { token, bytes: count }));
    }
    opcode_byte |= count as u8;
  }

  let encoding =
    match label {
      Some(label) => Encoding::Pending { opcode: opcode_byte, label, tail: argument_bytes },
      None => {
        let mut bytes = Vec::with_capacity(1 + argument_bytes.len());
        bytes.push(opcode_byte);
        bytes.extend(argument_bytes);
        Encoding::Fixed(bytes)
      }
    };

  Ok(ParsedLine::Instruction(CompiledInstruction {
    line,
    opcode,
    source: tokens.join(" "),
    encoding
  }))
}
