//! Lexer for the async C++ dialect
//!
//! Converts source code into a stream of tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The lexer state
pub struct Lexer {
    /// Source code as chars
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Current line (1-based)
    line: usize,
    /// Current column (1-based)
    column: usize,
    /// Start of the current token
    start: usize,
    start_line: usize,
    start_column: usize,
    /// True until a non-blank character is seen on the current line
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            start: 0,
            start_line: 1,
            start_column: 1,
            at_line_start: true,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn mark_start(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.start_line, self.start_column)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                // Line comment
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                // Block comment
                '/' if self.peek_next() == Some('*') => {
                    self.mark_start();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_next()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(Error::parse("unterminated block comment", self.make_span()));
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind)
    }

    /// Read a number literal, suffixes and hex digits included
    fn read_number(&mut self) -> Token {
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(self.source.get(self.pos.wrapping_sub(1)).copied(), Some('e') | Some('E'))
                && !self.source[self.start..self.pos].iter().any(|&ch| matches!(ch, 'x' | 'X'));
            if c.is_ascii_alphanumeric() || c == '_' || c == '\'' || exponent_sign {
                self.advance();
            } else if c == '.' && self.peek_next().map_or(false, |n| n.is_ascii_digit()) {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        self.make_token(TokenKind::Number(text))
    }

    /// Read a quoted literal; the body keeps escape sequences as written
    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let what = if quote == '"' { "string literal" } else { "character literal" };
        self.advance(); // consume opening quote

        let mut body = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(body);
                }
                Some('\\') => {
                    body.push('\\');
                    self.advance();
                    match self.peek() {
                        Some('\n') | None => break,
                        Some(c) => {
                            body.push(c);
                            self.advance();
                        }
                    }
                }
                Some('\n') | None => break,
                Some(c) => {
                    body.push(c);
                    self.advance();
                }
            }
        }
        Err(Error::parse(format!("unterminated {}", what), self.make_span()))
    }

    /// Read a preprocessor line verbatim
    fn read_directive(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let text: String = self.source[self.start..self.pos].iter().collect();
        self.make_token(TokenKind::Directive(text.trim_end().to_string()))
    }

    /// Consume one char and produce `kind`
    fn single(&mut self, kind: TokenKind) -> Token {
        self.advance();
        self.make_token(kind)
    }

    /// Consume one char, then a second one if it is `next`
    fn either(&mut self, next: char, long: TokenKind, short: TokenKind) -> Token {
        self.advance();
        if self.peek() == Some(next) {
            self.advance();
            self.make_token(long)
        } else {
            self.make_token(short)
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace()?;
        let directive_allowed = self.at_line_start;
        self.at_line_start = false;
        self.mark_start();

        let Some(c) = self.peek() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let token = match c {
            '#' if directive_allowed => self.read_directive(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            '"' => {
                let body = self.read_quoted('"')?;
                self.make_token(TokenKind::StringLit(body))
            }
            '\'' => {
                let body = self.read_quoted('\'')?;
                self.make_token(TokenKind::CharLit(body))
            }
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '?' => self.single(TokenKind::Question),
            '.' => self.single(TokenKind::Dot),
            '^' => self.single(TokenKind::Caret),
            '~' => self.single(TokenKind::Tilde),
            '%' => self.single(TokenKind::Percent),
            ':' => self.either(':', TokenKind::ColonColon, TokenKind::Colon),
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.either('=', TokenKind::Ne, TokenKind::Not),
            '*' => self.either('=', TokenKind::StarEq, TokenKind::Star),
            '/' => self.either('=', TokenKind::SlashEq, TokenKind::Slash),
            '&' => self.either('&', TokenKind::AndAnd, TokenKind::And),
            '|' => self.either('|', TokenKind::OrOr, TokenKind::Or),
            '+' => {
                self.advance();
                match self.peek() {
                    Some('+') => self.single(TokenKind::PlusPlus),
                    Some('=') => self.single(TokenKind::PlusEq),
                    _ => self.make_token(TokenKind::Plus),
                }
            }
            '-' => {
                self.advance();
                match self.peek() {
                    Some('-') => self.single(TokenKind::MinusMinus),
                    Some('=') => self.single(TokenKind::MinusEq),
                    Some('>') => self.single(TokenKind::Arrow),
                    _ => self.make_token(TokenKind::Minus),
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('<') => self.single(TokenKind::Shl),
                    Some('=') => self.single(TokenKind::Le),
                    _ => self.make_token(TokenKind::Lt),
                }
            }
            '>' => {
                self.advance();
                match self.peek() {
                    Some('>') => self.single(TokenKind::Shr),
                    Some('=') => self.single(TokenKind::Ge),
                    _ => self.make_token(TokenKind::Gt),
                }
            }
            other => {
                self.advance();
                return Err(Error::parse(format!("unexpected character '{}'", other), self.make_span()));
            }
        };
        Ok(token)
    }

    /// Tokenize the whole source; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_async_header() {
        let tokens = kinds("async Data fetchData(string url)");
        assert_eq!(tokens[0], TokenKind::Async);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "Data"));
        assert!(matches!(tokens[2], TokenKind::Ident(ref s) if s == "fetchData"));
        assert_eq!(tokens[3], TokenKind::LParen);
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_directive_only_at_line_start() {
        let tokens = kinds("#include <iostream>\n  #include <async_await>\nint x;");
        assert_eq!(tokens[0], TokenKind::Directive("#include <iostream>".to_string()));
        assert_eq!(tokens[1], TokenKind::Directive("#include <async_await>".to_string()));
        assert!(Lexer::new("int x; # y").tokenize().is_err());
    }

    #[test]
    fn test_operators_and_scope() {
        let tokens = kinds("std::cout << a->b >= c && !d++");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("std".to_string()),
                TokenKind::ColonColon,
                TokenKind::Ident("cout".to_string()),
                TokenKind::Shl,
                TokenKind::Ident("a".to_string()),
                TokenKind::Arrow,
                TokenKind::Ident("b".to_string()),
                TokenKind::Ge,
                TokenKind::Ident("c".to_string()),
                TokenKind::AndAnd,
                TokenKind::Not,
                TokenKind::Ident("d".to_string()),
                TokenKind::PlusPlus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literals_keep_spelling() {
        let tokens = kinds(r#"0x1F 1.5e-3f "a\"b\n" '\''"#);
        assert_eq!(tokens[0], TokenKind::Number("0x1F".to_string()));
        assert_eq!(tokens[1], TokenKind::Number("1.5e-3f".to_string()));
        assert_eq!(tokens[2], TokenKind::StringLit(r#"a\"b\n"#.to_string()));
        assert_eq!(tokens[3], TokenKind::CharLit(r"\'".to_string()));
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = kinds("a // line\n/* block\n comment */ b");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("int main()\n{\n    await foo();\n}").tokenize().unwrap();
        let await_tok = tokens.iter().find(|t| t.kind == TokenKind::Await).unwrap();
        assert_eq!(await_tok.span.line, 3);
        assert_eq!(await_tok.span.column, 5);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x = \"never closed\n;").tokenize().unwrap_err();
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 5);
        assert_eq!(err.to_string(), "unterminated string literal");
    }
}
