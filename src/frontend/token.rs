//! Token definitions for the async C++ dialect

use std::fmt;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// async
    Async,
    /// await
    Await,
    /// return
    Return,
    /// if
    If,
    /// else
    Else,
    /// while
    While,
    /// for
    For,
    /// do
    Do,
    /// break
    Break,
    /// continue
    Continue,
    /// true
    True,
    /// false
    False,
    /// const
    Const,
    /// using
    Using,

    // ============ Literals ============
    /// Identifier
    Ident(String),
    /// Number, kept as written (`42`, `0x1F`, `1.5f`)
    Number(String),
    /// String literal body, escapes kept as written
    StringLit(String),
    /// Character literal body, escapes kept as written
    CharLit(String),
    /// Whole preprocessor line (`#include <iostream>`)
    Directive(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    Le,
    /// >=
    Ge,
    /// <<
    Shl,
    /// >>
    Shr,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,
    /// &
    And,
    /// |
    Or,
    /// ^
    Caret,
    /// ~
    Tilde,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// :
    Colon,
    /// ::
    ColonColon,
    /// ?
    Question,
    /// .
    Dot,
    /// ->
    Arrow,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Get keyword from string
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "async" => Some(TokenKind::Async),
            "await" => Some(TokenKind::Await),
            "return" => Some(TokenKind::Return),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "do" => Some(TokenKind::Do),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "const" => Some(TokenKind::Const),
            "using" => Some(TokenKind::Using),
            _ => None,
        }
    }

    /// Binding power of a binary operator (higher binds tighter)
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            // Assignment (lowest, right-associative)
            TokenKind::Eq | TokenKind::PlusEq | TokenKind::MinusEq
                | TokenKind::StarEq | TokenKind::SlashEq => Some(1),

            // Conditional `?:` sits at 2, handled by the parser

            // Logical OR
            TokenKind::OrOr => Some(3),

            // Logical AND
            TokenKind::AndAnd => Some(4),

            // Bitwise OR
            TokenKind::Or => Some(5),

            // Bitwise XOR
            TokenKind::Caret => Some(6),

            // Bitwise AND
            TokenKind::And => Some(7),

            // Equality
            TokenKind::EqEq | TokenKind::Ne => Some(8),

            // Comparison
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => Some(9),

            // Shift (and stream insertion)
            TokenKind::Shl | TokenKind::Shr => Some(10),

            // Additive
            TokenKind::Plus | TokenKind::Minus => Some(11),

            // Multiplicative (highest for binary)
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(12),

            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Async => "'async'",
            TokenKind::Await => "'await'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::Do => "'do'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Const => "'const'",
            TokenKind::Using => "'using'",
            TokenKind::Ident(name) => return write!(f, "identifier `{}`", name),
            TokenKind::Number(n) => return write!(f, "number `{}`", n),
            TokenKind::StringLit(_) => "string literal",
            TokenKind::CharLit(_) => "character literal",
            TokenKind::Directive(_) => "preprocessor directive",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Not => "'!'",
            TokenKind::And => "'&'",
            TokenKind::Or => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Tilde => "'~'",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::ColonColon => "'::'",
            TokenKind::Question => "'?'",
            TokenKind::Dot => "'.'",
            TokenKind::Arrow => "'->'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}
