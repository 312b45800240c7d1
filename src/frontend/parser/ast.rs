//! Abstract syntax tree for the HolyC subset

use std::fmt;
use std::sync::Arc;

use crate::util::span::Span;

/// Primitive type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    U0,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Bool,
}

impl TypeName {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "U0" => TypeName::U0,
            "I8" => TypeName::I8,
            "U8" => TypeName::U8,
            "I16" => TypeName::I16,
            "U16" => TypeName::U16,
            "I32" => TypeName::I32,
            "U32" => TypeName::U32,
            "I64" => TypeName::I64,
            "U64" => TypeName::U64,
            "Bool" => TypeName::Bool,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeName::U0 => "U0",
            TypeName::I8 => "I8",
            TypeName::U8 => "U8",
            TypeName::I16 => "I16",
            TypeName::U16 => "U16",
            TypeName::I32 => "I32",
            TypeName::U32 => "U32",
            TypeName::I64 => "I64",
            TypeName::U64 => "U64",
            TypeName::Bool => "Bool",
        }
    }
}

/// A declared type: a primitive with optional pointer levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub base: TypeName,
    pub pointers: usize,
}

impl TypeRef {
    pub const I64: TypeRef = TypeRef {
        base: TypeName::I64,
        pointers: 0,
    };

    pub fn new(base: TypeName) -> Self {
        Self { base, pointers: 0 }
    }

    /// `U0` without indirection.
    pub fn is_void(&self) -> bool {
        self.base == TypeName::U0 && self.pointers == 0
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Truncate `value` to what a variable of this type can hold.
    pub fn narrow(
        &self,
        value: i64,
    ) -> i64 {
        if self.pointers > 0 {
            return value;
        }
        match self.base {
            TypeName::U0 => 0,
            TypeName::I8 => value as i8 as i64,
            TypeName::U8 => value as u8 as i64,
            TypeName::I16 => value as i16 as i64,
            TypeName::U16 => value as u16 as i64,
            TypeName::I32 => value as i32 as i64,
            TypeName::U32 => value as u32 as i64,
            TypeName::I64 | TypeName::U64 => value,
            TypeName::Bool => (value != 0) as i64,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.base.as_str())?;
        if self.pointers > 0 {
            write!(f, " {}", "*".repeat(self.pointers))?;
        }
        Ok(())
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Str(String),
    Var {
        name: String,
        span: Span,
    },
    /// `&Name`: reference to a function by name.
    FuncRef {
        name: String,
        span: Span,
    },
    /// Omitted arguments (`F(, 3)`) are `None`.
    Call {
        callee: String,
        args: Vec<Option<Expr>>,
        span: Span,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// `&&` when `and`, `||` otherwise.
    Logical {
        and: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        target: String,
        op: Option<BinOp>,
        value: Box<Expr>,
        span: Span,
    },
    /// `++x`, `x--`, ...
    Step {
        target: String,
        increment: bool,
        prefix: bool,
        span: Span,
    },
}

/// One declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeRef,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Expr(Expr),
    /// `"format", args;`
    Print {
        format: String,
        args: Vec<Expr>,
    },
    Block(Vec<Stmt>),
    Decl(Vec<VarDecl>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Try {
        body: Vec<Stmt>,
        handler: Vec<Stmt>,
    },
    Empty,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Expr>,
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub ret: TypeRef,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Class member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    /// Annotation text following the member name, verbatim.
    pub annotations: String,
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

/// Top-level item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Function(Arc<FunctionDef>),
    Class(ClassDef),
    Global(Vec<VarDecl>),
    Stmt(Stmt),
}

impl Item {
    /// Whether the item only declares names.
    pub fn is_declaration(&self) -> bool {
        !matches!(self, Item::Stmt(_))
    }
}

/// Parsed translation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub items: Vec<Item>,
}
