//! Renders an assembled program as a table of offsets, bytes, and the source they came from.

use prettytable::{format as TableFormat, Table};

use crate::assembler::{ListingEntry, Program};
use crate::bytecode::VERSION_HEADER;

lazy_static! {
  // Plain columns, a rule under the titles, no frame.
  static ref LISTING_FORMAT: TableFormat::TableFormat = {
    let title_rule = TableFormat::LineSeparator::new('=', ' ', ' ', ' ');
    TableFormat::FormatBuilder::new()
      .column_separator(' ')
      .separators(&[TableFormat::LinePosition::Title], title_rule)
      .padding(0, 2)
      .build()
  };
}

/// Space separated two digit hex, the way the listing and the `hex` output format print bytes.
pub fn hex_bytes(bytes: &[u8]) -> String {
  bytes.iter()
       .map(|byte| format!("{:02x}", byte))
       .collect::<Vec<String>>()
       .join(" ")
}

/// One row for the version header, then one row per label and instruction in source order.
pub fn listing_table(program: &Program) -> Table {
  let mut table = Table::new();

  table.set_format(*LISTING_FORMAT);
  table.set_titles(row![ubr->"Offset", ubl->"Bytes", ubr->"Line", ubl->"Source"]);

  table.add_row(row![r->format!("{:03}", 0), hex_bytes(&VERSION_HEADER), r->"", "; version header"]);

  for entry in program.entries() {
    match entry {

      ListingEntry::Label { line, name, offset } => {
        table.add_row(row![r->format!("{:03}", offset), "", r->line, format!("label {}", name)]);
      }

      ListingEntry::Instruction { line, offset, bytes, source } => {
        table.add_row(row![r->format!("{:03}", offset), hex_bytes(bytes), r->line, format!("  {}", source)]);
      }

    }
  }

  table.add_row(row![r->format!("{:03}", program.len()), "", r->"", "; end"]);
  table
}

impl Program {
  pub fn listing(&self) -> Table {
    listing_table(self)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembler::Assembler;

  #[test]
  fn hex_formatting() {
    assert_eq!(hex_bytes(&[0x80, 0x00, 0x1B]), "80 00 1b");
    assert_eq!(hex_bytes(&[]), "");
  }

  #[test]
  fn listing_rows() {
    let program = Assembler::new().assemble("label top\nwrite_analog_channel_3 1000\njump top").unwrap();
    let table = program.listing();
    // header, label, two instructions, end marker
    assert_eq!(table.len(), 5);

    let text = table.to_string();
    assert!(text.contains("80 00"));
    assert!(text.contains("label top"));
    assert!(text.contains("13 e8 03"));
    assert!(text.contains("70 02"));
    assert!(text.contains("write_analog_channel_3 1000"));
  }
}
