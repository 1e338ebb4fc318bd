//! Abstract Syntax Tree definitions for the async C++ dialect

use crate::utils::Span;

/// A complete program (translation unit)
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// Iterate over the function declarations in source order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(f) => Some(f),
            _ => None,
        })
    }
}

/// Top-level items
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Preprocessor line, kept verbatim
    Directive { text: String, span: Span },
    /// `using namespace std;` / `using std::string;`
    Using { path: String, span: Span },
    /// Global variable
    Variable(VarDecl),
    Function(FunctionDecl),
    /// Declaration without a body: `Data download(string url);`
    Prototype(Prototype),
    /// Statement written outside any function
    Statement(Stmt),
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Param>,
    pub body: Block,
    /// Declared with the `async` qualifier
    pub is_async: bool,
    pub span: Span,
}

/// Function declaration without a body
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Param>,
    pub is_async: bool,
    pub span: Span,
}

/// Function or lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
    pub span: Span,
}

/// A type as written: `const std::vector<Data>&`
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub is_const: bool,
    /// Scope-qualified name (`std::future`)
    pub name: String,
    /// Template arguments
    pub args: Vec<Type>,
    pub declarators: Vec<Declarator>,
}

/// Pointer/reference suffix of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declarator {
    Pointer,
    Reference,
}

impl Type {
    /// A plain named type
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            is_const: false,
            name: name.into(),
            args: Vec::new(),
            declarators: Vec::new(),
        }
    }

    /// A template instantiation `name<args...>`
    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Self {
            args,
            ..Self::named(name)
        }
    }
}

/// Block of statements
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Variable declaration `Type name = init;`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Type,
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    VarDecl(VarDecl),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    /// `for (init cond; step) body`; `init` is a declaration or an
    /// expression statement and carries its own `;`
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Block(Block),
    /// Lone `;`
    Empty {
        span: Span,
    },
}

/// Literal values, spelled as in the source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Char(String),
    Bool(bool),
}

/// Lambda literal
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// Capture list items (`=`, `&x`, `this`); `None` for the
    /// `async T(params) { ... }` spelling, which has no brackets
    pub captures: Option<Vec<String>>,
    pub params: Vec<Param>,
    pub ret_type: Option<Type>,
    pub body: Block,
    pub is_async: bool,
    pub span: Span,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    /// Identifier, possibly scope-qualified (`std::cout`)
    Ident {
        name: String,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Await {
        expr: Box<Expr>,
        span: Span,
    },
    Lambda(Box<Lambda>),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Postfix {
        op: PostfixOp,
        expr: Box<Expr>,
        span: Span,
    },
    /// `object.member` or `object->member`
    Member {
        object: Box<Expr>,
        member: String,
        arrow: bool,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    Paren {
        expr: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. } => *span,
            Expr::Ident { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Await { span, .. } => *span,
            Expr::Lambda(lambda) => lambda.span,
            Expr::Binary { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Postfix { span, .. } => *span,
            Expr::Member { span, .. } => *span,
            Expr::Index { span, .. } => *span,
            Expr::Conditional { span, .. } => *span,
            Expr::Paren { span, .. } => *span,
        }
    }

    /// True for expressions that can be the receiver of `.member`
    /// without parentheses
    pub fn is_postfix_level(&self) -> bool {
        matches!(
            self,
            Expr::Literal { .. }
                | Expr::Ident { .. }
                | Expr::Call { .. }
                | Expr::Postfix { .. }
                | Expr::Member { .. }
                | Expr::Index { .. }
                | Expr::Paren { .. }
        )
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            BinOp::Assign | BinOp::AddAssign | BinOp::SubAssign | BinOp::MulAssign | BinOp::DivAssign
        )
    }
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// -
    Neg,
    /// !
    Not,
    /// ~
    BitNot,
    /// *
    Deref,
    /// &
    AddrOf,
    /// ++x
    PreInc,
    /// --x
    PreDec,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
            UnaryOp::PreInc => "++",
            UnaryOp::PreDec => "--",
        }
    }
}

/// Postfix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

impl PostfixOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostfixOp::Inc => "++",
            PostfixOp::Dec => "--",
        }
    }
}
