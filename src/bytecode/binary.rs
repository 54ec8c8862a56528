/*!
  This module is responsible for the encoding and decoding of instruction arguments.

  Three wire formats are used by the device:

    Varint:      7 bits per byte, least significant group first. Bit 7 is set on every
                 byte except the last.
    Uint16:      2 bytes, little-endian.
    Pin bitmask: 2 bits per pin, 4 pins per byte. The first four pins live in the LAST
                 byte, the next four in the second to last, and so on.

  Within a bitmask byte, pin `i` of its group of four occupies bits `2i..2i+1`:

    00  low
    01  high
    10  ignore
    11  don't care (the default for padding and unknown symbols)
*/

use std::convert::TryFrom;

use crate::error::EncodingError;

/// Pins packed into one bitmask byte.
pub const PINS_PER_BYTE: usize = 4;
/// The opcode's low nibble holds the bitmask length, so it cannot exceed this.
pub const MAX_PIN_BYTES: usize = 0x0F;

const CONTINUATION_BIT: u8 = 0b1000_0000;
const PAYLOAD_BITS: u8 = 0b0111_1111;
const PIN_FIELD: u8 = 0b11;

/// Number of bytes a bitmask of `symbols` pin states packs into.
pub fn pin_byte_count(symbols: usize) -> usize {
  (symbols + PINS_PER_BYTE - 1) / PINS_PER_BYTE
}

/**
  Encodes a string of decimal digits as a varint, however many digits there are. The
  number is divided by 128 digit by digit until nothing is left, each remainder being the
  next group. Leading zeros are ignored and an empty string encodes as zero.
*/
pub fn encode_varint(digits: &str) -> Vec<u8> {
  debug_assert!(digits.bytes().all(|digit| digit.is_ascii_digit()));

  let mut quotient: Vec<u8> = digits.bytes()
                                    .map(|digit| digit - b'0')
                                    .skip_while(|digit| *digit == 0)
                                    .collect();
  let mut payload = Vec::new();
  loop {
    let mut remainder: u16 = 0;
    let mut next = Vec::with_capacity(quotient.len());
    for digit in &quotient {
      let dividend = remainder * 10 + *digit as u16;
      if !next.is_empty() || dividend >= 128 {
        next.push((dividend / 128) as u8);
      }
      remainder = dividend % 128;
    }
    quotient = next;

    let group = remainder as u8;
    if quotient.is_empty() {
      payload.push(group);
      return payload;
    }
    payload.push(group | CONTINUATION_BIT);
  }
}

/**
  Walks the continuation bits at the front of `bytes`. Returns the value together with the
  number of bytes it occupied, or `None` if the stream ends mid-varint or the value
  overflows 64 bits.
*/
pub fn decode_varint(bytes: &[u8]) -> Option<(u64, usize)> {
  let mut value: u64 = 0;
  for (i, byte) in bytes.iter().enumerate() {
    let shift = 7 * i as u32;
    let group = (byte & PAYLOAD_BITS) as u64;
    if shift >= 64 || (group << shift) >> shift != group {
      return None;
    }
    value |= group << shift;
    if byte & CONTINUATION_BIT == 0 {
      return Some((value, i + 1));
    }
  }
  None
}

/// Encodes an analog output value. Values outside `0..=65535` are rejected, not wrapped.
pub fn encode_u16(value: i64) -> Result<[u8; 2], EncodingError> {
  let value = u16::try_from(value).map_err(|_| {
    EncodingError::OutOfRange { value, max: u16::max_value() as u64 }
  })?;
  Ok(value.to_le_bytes())
}

pub fn decode_u16(bytes: &[u8]) -> Option<u16> {
  match bytes {
    [low, high, ..] => Some(u16::from_le_bytes([*low, *high])),
    _ => None
  }
}

/**
  Packs pin states into the device's bitmask format. `'0'` drives or expects low, `'1'`
  high, `'i'` marks the pin as explicitly ignored, and any other symbol leaves the pin as
  don't care.
*/
pub fn encode_pin_bits(states: &str) -> Vec<u8> {
  let symbols: Vec<char> = states.chars().collect();
  let mut payload = vec![0xFFu8; pin_byte_count(symbols.len())];
  let last = payload.len();

  for (i, state) in symbols.iter().enumerate() {
    let bit_index = (i * 2) % 8;
    let byte_index = last - i / PINS_PER_BYTE - 1;
    let cleared: u8 = match state {
      '0' => 0b11,
      '1' => 0b10,
      'i' => 0b01,
      _ => 0b00
    };
    payload[byte_index] &= !(cleared << bit_index);
  }

  payload
}

/// Inverse of `encode_pin_bits`. Don't care pins come back as `'x'`, four symbols per byte.
pub fn decode_pin_bits(bytes: &[u8]) -> String {
  let mut states = String::with_capacity(bytes.len() * PINS_PER_BYTE);
  for byte in bytes.iter().rev() {
    for slot in 0..PINS_PER_BYTE {
      let state = match (byte >> (slot * 2)) & PIN_FIELD {
        0b00 => '0',
        0b01 => '1',
        0b10 => 'i',
        _ => 'x'
      };
      states.push(state);
    }
  }
  states
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn varint_zero_is_one_byte() {
    assert_eq!(encode_varint("0"), vec![0x00]);
    assert_eq!(encode_varint("000"), vec![0x00]);
  }

  #[test]
  fn varint_300() {
    assert_eq!(encode_varint("300"), vec![0b1010_1100, 0b0000_0010]);
    assert_eq!(encode_varint("00300"), vec![0b1010_1100, 0b0000_0010]);
  }

  #[test]
  fn varint_single_byte_boundary() {
    assert_eq!(encode_varint("127"), vec![0x7F]);
    assert_eq!(encode_varint("128"), vec![0x80, 0x01]);
    assert_eq!(encode_varint("16384"), vec![0x80, 0x80, 0x01]);
  }

  #[test]
  fn varint_has_no_upper_bound() {
    // 2^63
    assert_eq!(
      encode_varint("9223372036854775808"),
      vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]
    );
    // 2^64 - 1
    assert_eq!(
      encode_varint("18446744073709551615"),
      vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
    // 2^70
    assert_eq!(
      encode_varint("1180591620717411303424"),
      vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]
    );
  }

  #[test]
  fn varint_decodes_what_it_encodes() {
    for value in [0u64, 1, 5, 127, 128, 300, 65_535, 1 << 35, u64::max_value()].iter() {
      let bytes = encode_varint(&value.to_string());
      assert_eq!(decode_varint(&bytes), Some((*value, bytes.len())));
    }
  }

  #[test]
  fn varint_decode_stops_at_last_byte() {
    assert_eq!(decode_varint(&[0xAC, 0x02, 0xFF]), Some((300, 2)));
    assert_eq!(decode_varint(&[0xAC]), None);
    assert_eq!(decode_varint(&[]), None);
  }

  #[test]
  fn u16_is_little_endian() {
    assert_eq!(encode_u16(1000).unwrap(), [0xE8, 0x03]);
    assert_eq!(encode_u16(65_535).unwrap(), [0xFF, 0xFF]);
    assert_eq!(decode_u16(&[0xE8, 0x03]), Some(1000));
    assert_eq!(decode_u16(&[0xE8]), None);
  }

  #[test]
  fn u16_rejects_out_of_range() {
    assert_eq!(
      encode_u16(65_536),
      Err(EncodingError::OutOfRange { value: 65_536, max: 65_535 })
    );
    assert!(encode_u16(-1).is_err());
  }

  #[test]
  fn pin_bits_single_group() {
    // pin 0 -> 00, pin 1 -> 01, pin 2 -> 10, pin 3 -> 00, read from the low bits up
    assert_eq!(encode_pin_bits("01i0"), vec![0b0010_0100]);
    assert_eq!(encode_pin_bits("1"), vec![0b1111_1101]);
    assert_eq!(encode_pin_bits("x"), vec![0xFF]);
  }

  #[test]
  fn pin_bits_fill_groups_in_reverse() {
    let packed = encode_pin_bits("00001111");
    assert_eq!(packed, vec![0b0101_0101, 0b0000_0000]);

    let packed = encode_pin_bits("0000i");
    assert_eq!(packed.len(), 2);
    assert_eq!(packed[1], 0x00);
    assert_eq!(packed[0], 0b1111_1110);
  }

  #[test]
  fn pin_bits_length() {
    for length in 1..=4 {
      assert_eq!(encode_pin_bits(&"1".repeat(length)).len(), 1);
    }
    for length in 5..=8 {
      assert_eq!(encode_pin_bits(&"i".repeat(length)).len(), 2);
    }
    assert_eq!(encode_pin_bits(&"0".repeat(9)).len(), 3);
  }

  #[test]
  fn pin_bits_decode_pads_with_dont_care() {
    assert_eq!(decode_pin_bits(&encode_pin_bits("01i0")), "01i0");
    assert_eq!(decode_pin_bits(&encode_pin_bits("01i01")), "01i01xxx");
    assert_eq!(encode_pin_bits(&decode_pin_bits(&[0x12, 0x9C])), vec![0x12, 0x9C]);
  }
}
