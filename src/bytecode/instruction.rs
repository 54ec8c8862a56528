use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::binary::pin_byte_count;

/**
  Opcodes of the virtual machine, keyed by their base opcode byte.

  The high nibble selects the operation. The twelve analog channels share the `0x1_`
  nibble and are told apart by the low nibble. For every operation that carries a pin
  bitmask the low nibble instead holds the bitmask's packed length in bytes, so the base
  values below are the opcode byte with that nibble cleared. `0x8_` is reserved: the
  version header starts with `0x80`.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
  WriteDigital          = 0x00, // write_digital <pins>

  #[strum(to_string = "write_analog_channel_0")]  WriteAnalogChannel0  = 0x10,
  #[strum(to_string = "write_analog_channel_1")]  WriteAnalogChannel1  = 0x11,
  #[strum(to_string = "write_analog_channel_2")]  WriteAnalogChannel2  = 0x12,
  #[strum(to_string = "write_analog_channel_3")]  WriteAnalogChannel3  = 0x13,
  #[strum(to_string = "write_analog_channel_4")]  WriteAnalogChannel4  = 0x14,
  #[strum(to_string = "write_analog_channel_5")]  WriteAnalogChannel5  = 0x15,
  #[strum(to_string = "write_analog_channel_6")]  WriteAnalogChannel6  = 0x16,
  #[strum(to_string = "write_analog_channel_7")]  WriteAnalogChannel7  = 0x17,
  #[strum(to_string = "write_analog_channel_8")]  WriteAnalogChannel8  = 0x18,
  #[strum(to_string = "write_analog_channel_9")]  WriteAnalogChannel9  = 0x19,
  #[strum(to_string = "write_analog_channel_10")] WriteAnalogChannel10 = 0x1A,
  #[strum(to_string = "write_analog_channel_11")] WriteAnalogChannel11 = 0x1B,

  SleepMs               = 0x20, // sleep_ms <ms>
  SleepMatchAll         = 0x30, // sleep_match_all <pins>
  SleepMatchAny         = 0x40, // sleep_match_any <pins>
  SleepMatchAllTimeout  = 0x50, // sleep_match_all_timeout <pins> <ms>
  SleepMatchAnyTimeout  = 0x60, // sleep_match_any_timeout <pins> <ms>

  Jump                  = 0x70, // jump <label>
  JumpMatchAll          = 0x90, // jump_match_all <label> <pins>
  JumpMatchAny          = 0xA0, // jump_match_any <label> <pins>
  JumpCount             = 0xB0, // jump_count <label> <count>

  Exit                  = 0xC0, // exit
}

/// How one argument token is turned into bytes.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum ArgumentKind {
  /// `ceil(n / 4)` bytes of packed pin states.
  PinBitmask,
  /// 2 bytes, little-endian.
  Uint16,
  /// 1 or more bytes of base-128 varint.
  Varint,
  /// 1 byte holding the label's offset, filled in by the second pass.
  JumpLabel,
}

/// Extra bits OR-ed into the opcode byte, computed from the tokens of the source line.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum DynamicOpcode {
  /// The packed byte count of the bitmask string found at `token` (the mnemonic is token 0).
  PinByteCount { token: usize },
}

impl DynamicOpcode {
  pub fn token(&self) -> usize {
    match self {
      DynamicOpcode::PinByteCount { token } => *token
    }
  }

  /// `tokens` must already have passed the arity check.
  pub fn bits(&self, tokens: &[String]) -> usize {
    match self {
      DynamicOpcode::PinByteCount { token } => pin_byte_count(tokens[*token].chars().count())
    }
  }
}

/// Everything the line compiler needs to know about one mnemonic.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct InstructionDefinition {
  pub opcode: Opcode,
  pub arguments: &'static [ArgumentKind],
  pub dynamic: Option<DynamicOpcode>,
}

impl InstructionDefinition {
  pub fn arity(&self) -> usize {
    self.arguments.len()
  }
}

/// Selects between the current instruction definitions and the historical ones.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum InstructionSet {
  Current,
  /// See `Opcode::legacy_definition`.
  Legacy,
}

impl InstructionSet {
  pub fn definition(&self, opcode: Opcode) -> InstructionDefinition {
    match self {
      InstructionSet::Current => opcode.definition(),
      InstructionSet::Legacy => opcode.legacy_definition()
    }
  }
}

use ArgumentKind::*;

const PINS: &[ArgumentKind] = &[PinBitmask];
const UINT16: &[ArgumentKind] = &[Uint16];
const VARINT: &[ArgumentKind] = &[Varint];
const PINS_VARINT: &[ArgumentKind] = &[PinBitmask, Varint];
const LABEL: &[ArgumentKind] = &[JumpLabel];
const LABEL_PINS: &[ArgumentKind] = &[JumpLabel, PinBitmask];
const LABEL_VARINT: &[ArgumentKind] = &[JumpLabel, Varint];
const NONE: &[ArgumentKind] = &[];

impl Opcode {
  /// The base opcode byte, before any dynamic bits are added.
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn mnemonic(&self) -> &'static str {
    (*self).into()
  }

  /// Jump-family instructions carry their target offset right after the opcode byte.
  pub fn is_jump(&self) -> bool {
    match self {
      Opcode::Jump | Opcode::JumpMatchAll | Opcode::JumpMatchAny | Opcode::JumpCount => true,
      _ => false
    }
  }

  pub fn definition(&self) -> InstructionDefinition {
    let (arguments, dynamic_token) =
      match self {
        Opcode::WriteDigital
        | Opcode::SleepMatchAll
        | Opcode::SleepMatchAny => (PINS, Some(1)),

        Opcode::SleepMatchAllTimeout
        | Opcode::SleepMatchAnyTimeout => (PINS_VARINT, Some(1)),

        Opcode::SleepMs => (VARINT, None),
        Opcode::Jump => (LABEL, None),
        Opcode::JumpMatchAll | Opcode::JumpMatchAny => (LABEL_PINS, Some(2)),
        Opcode::JumpCount => (LABEL_VARINT, None),
        Opcode::Exit => (NONE, None),

        // Every remaining opcode is an analog channel.
        _ => (UINT16, None)
      };

    InstructionDefinition {
      opcode: *self,
      arguments,
      dynamic: dynamic_token.map(|token| DynamicOpcode::PinByteCount { token }),
    }
  }

  /**
    The definition as the first generation of tools emitted it: the two timeout sleeps
    measured the timeout token instead of the bitmask token. Only those two differ.
  */
  pub fn legacy_definition(&self) -> InstructionDefinition {
    let mut definition = self.definition();
    if let Opcode::SleepMatchAllTimeout | Opcode::SleepMatchAnyTimeout = self {
      definition.dynamic = Some(DynamicOpcode::PinByteCount { token: 2 });
    }
    definition
  }

  /**
    Finds the opcode an encoded opcode byte starts with. The analog channels match on the
    whole byte; every other operation matches on the high nibble, and the low nibble must
    be zero unless the operation carries a pin bitmask.
  */
  pub fn from_opcode_byte(byte: u8) -> Option<Opcode> {
    use std::convert::TryFrom;

    if byte & 0xF0 == Opcode::WriteAnalogChannel0.code() {
      return Opcode::try_from(byte).ok();
    }
    let opcode = Opcode::try_from(byte & 0xF0).ok()?;
    match opcode.definition().dynamic {
      Some(_) => Some(opcode),
      None if byte & 0x0F == 0 => Some(opcode),
      None => None
    }
  }
}


#[cfg(test)]
mod tests {
  use std::str::FromStr;
  use strum::IntoEnumIterator;

  use super::*;
  use super::ArgumentKind::*;

  #[test]
  fn mnemonics_parse() {
    assert_eq!(Opcode::from_str("write_digital"), Ok(Opcode::WriteDigital));
    assert_eq!(Opcode::from_str("write_analog_channel_0"), Ok(Opcode::WriteAnalogChannel0));
    assert_eq!(Opcode::from_str("write_analog_channel_11"), Ok(Opcode::WriteAnalogChannel11));
    assert_eq!(Opcode::from_str("sleep_match_any_timeout"), Ok(Opcode::SleepMatchAnyTimeout));
    assert_eq!(Opcode::from_str("jump_count"), Ok(Opcode::JumpCount));
    assert_eq!(Opcode::from_str("exit"), Ok(Opcode::Exit));
    assert!(Opcode::from_str("label").is_err());
    assert!(Opcode::from_str("write_analog_channel_12").is_err());
  }

  #[test]
  fn mnemonics_display_as_parsed() {
    for opcode in Opcode::iter() {
      assert_eq!(Opcode::from_str(&opcode.to_string()), Ok(opcode));
      assert_eq!(opcode.mnemonic(), opcode.to_string());
    }
    assert_eq!(Opcode::WriteAnalogChannel7.to_string(), "write_analog_channel_7");
  }

  #[test]
  fn table_has_every_mnemonic() {
    let mnemonics: Vec<&'static str> = Opcode::iter().map(|opcode| opcode.mnemonic()).collect();
    assert_eq!(
      mnemonics,
      vec![
        "write_digital",
        "write_analog_channel_0", "write_analog_channel_1", "write_analog_channel_2",
        "write_analog_channel_3", "write_analog_channel_4", "write_analog_channel_5",
        "write_analog_channel_6", "write_analog_channel_7", "write_analog_channel_8",
        "write_analog_channel_9", "write_analog_channel_10", "write_analog_channel_11",
        "sleep_ms",
        "sleep_match_all", "sleep_match_any", "sleep_match_all_timeout", "sleep_match_any_timeout",
        "jump", "jump_match_all", "jump_match_any", "jump_count",
        "exit",
      ]
    );
  }

  #[test]
  fn analog_channels_are_consecutive() {
    let channels: Vec<u8> = Opcode::iter()
      .filter(|opcode| opcode.mnemonic().starts_with("write_analog_channel_"))
      .map(|opcode| opcode.code())
      .collect();
    assert_eq!(channels, (0x10..=0x1B).collect::<Vec<u8>>());
  }

  #[test]
  fn arity_matches_arguments() {
    assert_eq!(Opcode::Exit.definition().arity(), 0);
    assert_eq!(Opcode::WriteDigital.definition().arity(), 1);
    assert_eq!(Opcode::SleepMatchAllTimeout.definition().arguments, &[PinBitmask, Varint]);
    assert_eq!(Opcode::JumpMatchAny.definition().arguments, &[JumpLabel, PinBitmask]);
    assert_eq!(Opcode::JumpCount.definition().arguments, &[JumpLabel, Varint]);
  }

  #[test]
  fn dynamic_bits_point_at_the_bitmask() {
    for opcode in Opcode::iter() {
      let definition = opcode.definition();
      match definition.dynamic {
        Some(dynamic) => assert_eq!(definition.arguments[dynamic.token() - 1], PinBitmask),
        None => assert!(!definition.arguments.contains(&PinBitmask)),
      }
    }
  }

  #[test]
  fn jump_targets_follow_the_opcode() {
    for opcode in Opcode::iter() {
      let arguments = opcode.definition().arguments;
      assert_eq!(opcode.is_jump(), arguments.first() == Some(&JumpLabel));
      assert!(!arguments.iter().skip(1).any(|kind| *kind == JumpLabel));
    }
  }

  #[test]
  fn legacy_timeout_measures_the_timeout() {
    let definition = Opcode::SleepMatchAnyTimeout.legacy_definition();
    let tokens: Vec<String> = vec!["sleep_match_any_timeout".into(), "1".into(), "100000".into()];
    assert_eq!(definition.dynamic.map(|dynamic| dynamic.bits(&tokens)), Some(2));
    assert_eq!(Opcode::SleepMatchAnyTimeout.definition().dynamic.map(|d| d.bits(&tokens)), Some(1));
    assert_eq!(Opcode::JumpMatchAll.legacy_definition(), Opcode::JumpMatchAll.definition());
  }

  #[test]
  fn opcode_bytes_decode() {
    assert_eq!(Opcode::from_opcode_byte(0x13), Some(Opcode::WriteAnalogChannel3));
    assert_eq!(Opcode::from_opcode_byte(0x1C), None);
    assert_eq!(Opcode::from_opcode_byte(0x02), Some(Opcode::WriteDigital));
    assert_eq!(Opcode::from_opcode_byte(0x92), Some(Opcode::JumpMatchAll));
    assert_eq!(Opcode::from_opcode_byte(0x70), Some(Opcode::Jump));
    assert_eq!(Opcode::from_opcode_byte(0x71), None);
    assert_eq!(Opcode::from_opcode_byte(0x80), None);
    assert_eq!(Opcode::from_opcode_byte(0xC0), Some(Opcode::Exit));
  }
}
