//! Named symbol tables (`HashFind`)
//!
//! Names are interned once when an entry is added; lookups check the interner
//! first and then hit a `(Symbol, HashKind)` index, so a miss on an unknown name
//! never allocates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::FieldDescriptor;

/// Interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind discriminator for table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Class,
    Function,
}

/// `HashKind::Class` as compiled code passes it.
pub const HTT_CLASS: i64 = 1;
/// `HashKind::Function` as compiled code passes it.
pub const HTT_FUNCTION: i64 = 2;

impl HashKind {
    pub fn code(self) -> i64 {
        match self {
            HashKind::Class => HTT_CLASS,
            HashKind::Function => HTT_FUNCTION,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            HTT_CLASS => Some(HashKind::Class),
            HTT_FUNCTION => Some(HashKind::Function),
            _ => None,
        }
    }
}

/// Native-callable entry point: integer arguments in, integer result out.
pub type NativeFn = Arc<dyn Fn(&[i64]) -> i64 + Send + Sync>;

/// A class published by compiled code.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub name: Arc<str>,
    pub members: Vec<Arc<FieldDescriptor>>,
}

/// A function published by compiled code.
#[derive(Clone)]
pub struct FunctionEntry {
    pub name: Arc<str>,
    /// Number of declared parameters.
    pub arity: usize,
    pub call: NativeFn,
}

impl fmt::Debug for FunctionEntry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Entry of a symbol table.
#[derive(Debug, Clone)]
pub enum HashEntry {
    Class(ClassEntry),
    Function(FunctionEntry),
}

impl HashEntry {
    pub fn name(&self) -> &str {
        match self {
            HashEntry::Class(class) => &class.name,
            HashEntry::Function(function) => &function.name,
        }
    }

    pub fn kind(&self) -> HashKind {
        match self {
            HashEntry::Class(_) => HashKind::Class,
            HashEntry::Function(_) => HashKind::Function,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionEntry> {
        match self {
            HashEntry::Function(function) => Some(function),
            HashEntry::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassEntry> {
        match self {
            HashEntry::Class(class) => Some(class),
            HashEntry::Function(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Interner {
    names: RwLock<IndexSet<Arc<str>>>,
}

impl Interner {
    fn intern(
        &self,
        name: &str,
    ) -> Symbol {
        if let Some(symbol) = self.lookup(name) {
            return symbol;
        }
        let (index, _) = self.names.write().insert_full(Arc::from(name));
        Symbol(index as u32)
    }

    fn lookup(
        &self,
        name: &str,
    ) -> Option<Symbol> {
        self.names
            .read()
            .get_index_of(name)
            .map(|index| Symbol(index as u32))
    }
}

type Table = HashMap<(Symbol, HashKind), HashEntry>;

/// All named symbol tables of a runtime.
#[derive(Debug, Default)]
pub struct HashTables {
    interner: Interner,
    tables: RwLock<HashMap<Symbol, Table>>,
}

impl HashTables {
    /// Table compiled units publish their globals into.
    pub const GLOBAL: &'static str = "global";

    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`.
    pub fn intern(
        &self,
        name: &str,
    ) -> Symbol {
        self.interner.intern(name)
    }

    /// Add `entry` to `table`, replacing an entry of the same name and kind.
    ///
    /// Returns the replaced entry.
    pub fn add(
        &self,
        table: &str,
        entry: HashEntry,
    ) -> Option<HashEntry> {
        let table = self.interner.intern(table);
        let key = (self.interner.intern(entry.name()), entry.kind());
        self.tables
            .write()
            .entry(table)
            .or_default()
            .insert(key, entry)
    }

    /// `HashFind`: exact-name lookup in `table` restricted to `kind`.
    pub fn find(
        &self,
        name: &str,
        table: &str,
        kind: HashKind,
    ) -> Option<HashEntry> {
        let table = self.interner.lookup(table)?;
        let name = self.interner.lookup(name)?;
        self.tables.read().get(&table)?.get(&(name, kind)).cloned()
    }

    /// Names of every entry of `kind` in `table`, sorted.
    pub fn names(
        &self,
        table: &str,
        kind: HashKind,
    ) -> Vec<String> {
        let Some(table) = self.interner.lookup(table) else {
            return Vec::new();
        };
        let tables = self.tables.read();
        let mut names: Vec<String> = tables
            .get(&table)
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.kind() == kind)
                    .map(|entry| entry.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
