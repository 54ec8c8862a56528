use std::collections::HashMap;

use string_cache::DefaultAtom;

use crate::error::AssemblyError;

/**
  A symbol table maps label names to the byte offset of the instruction that follows the
  declaration. One table lives for exactly one assembly: the first pass fills it, the
  second pass only reads it.
*/
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
  table: HashMap<DefaultAtom, Binding>,
  strict: bool,
}

#[derive(Clone, Copy, Debug)]
struct Binding {
  offset: usize,
  line: usize,
}

impl SymbolTable {

  /// In a strict table a name may only be declared once. Otherwise the last declaration wins.
  pub fn new(strict: bool) -> SymbolTable {
    SymbolTable {
      table: HashMap::new(),
      strict
    }
  }

  pub fn declare(&mut self, name: DefaultAtom, offset: usize, line: usize)
    -> Result<(), AssemblyError>
  {
    if self.strict {
      if let Some(first) = self.table.get(&name) {
        return Err(AssemblyError::DuplicateLabel { line, label: name, first_line: first.line });
      }
    }
    self.table.insert(name, Binding { offset, line });
    Ok(())
  }

  pub fn get_offset(&self, name: &DefaultAtom) -> Option<usize> {
    self.table.get(name).map(|binding| binding.offset)
  }

  /// Like `get_offset`, but a missing name is an error against the jump on `line`.
  pub fn resolve(&self, name: &DefaultAtom, line: usize) -> Result<usize, AssemblyError> {
    self.get_offset(name).ok_or_else(|| {
      AssemblyError::UndeclaredLabel { line, label: name.clone() }
    })
  }
}
