//! Tokenizer for the script language.
//!
//! Produces a flat token list with source positions.  Template literals are
//! lexed eagerly: the literal parts are cooked here and every `${…}`
//! interpolation becomes its own token list, parsed later on its own.

use super::error::ParseError;
use super::parser::MAX_NESTING;
use super::stack::ensure_sufficient_stack;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    Str(String),
    /// `` `a${x}b` `` → quasis `["a", "b"]`, one token list per interpolation.
    Template {
        quasis: Vec<String>,
        exprs: Vec<Vec<Spanned>>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    /// Identifiers and keywords alike; the parser tells them apart.
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// A token with its position.  `line` is 1-based, `column` 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

/// Longest first, so a prefix never shadows a longer operator.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "...", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

/// Keywords after which a `/` starts a regex rather than a division.
const REGEX_PRECEDERS: &[&str] = &[
    "return", "typeof", "void", "delete", "in", "instanceof", "new", "else", "await", "case",
    "do",
];

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Whether the last token emitted could end an expression.
    after_operand: bool,
    /// Templates open around the current position.
    templates: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            after_operand: false,
            templates: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Skip whitespace and comments; report whether a line break was seen.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut newline = false;
        loop {
            match self.peek() {
                Some('\n') => {
                    newline = true;
                    self.advance();
                }
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            None => {
                                return Err(ParseError::new("Unterminated comment", line, column))
                            }
                            Some('\n') => newline = true,
                            Some('*') if self.eat('/') => break,
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned, ParseError> {
        let newline_before = self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let token = match self.peek() {
            None => Token::Eof,
            Some(c) if c.is_ascii_digit() => self.read_number()?,
            Some('.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()?
            }
            Some(c) if is_ident_start(c) => {
                let mut s = String::new();
                while let Some(c) = self.peek().filter(|c| is_ident_part(*c)) {
                    s.push(c);
                    self.advance();
                }
                Token::Ident(s)
            }
            Some(q @ ('"' | '\'')) => {
                self.advance();
                self.read_string(q)?
            }
            Some('`') => {
                self.advance();
                self.read_template()?
            }
            Some('/') if !self.after_operand => {
                self.advance();
                self.read_regex()?
            }
            Some(c) => {
                let punct = PUNCTUATORS
                    .iter()
                    .copied()
                    .find(|p| self.starts_with(p))
                    .ok_or_else(|| self.error(format!("Unexpected character '{c}'")))?;
                // `a?.5:b` is a conditional, not optional chaining
                let punct = if punct == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())
                {
                    "?"
                } else {
                    punct
                };
                for _ in 0..punct.chars().count() {
                    self.advance();
                }
                Token::Punct(punct)
            }
        };
        self.after_operand = match &token {
            Token::Num(_) | Token::Str(_) | Token::Template { .. } | Token::Regex { .. } => true,
            Token::Ident(name) => !REGEX_PRECEDERS.contains(&name.as_str()),
            Token::Punct(p) => matches!(*p, ")" | "]" | "}" | "++" | "--"),
            Token::Eof => false,
        };
        Ok(Spanned {
            token,
            line,
            column,
            newline_before,
        })
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(|c| c.is_digit(radix) || *c == '_') {
                    if c != '_' {
                        digits.push(c);
                    }
                    self.advance();
                }
                return u64::from_str_radix(&digits, radix)
                    .map(|n| Token::Num(n as f64))
                    .map_err(|_| self.error("Invalid number"));
            }
        }

        let mut s = String::new();
        self.read_digits(&mut s);
        if self.peek() == Some('.') {
            s.push('.');
            self.advance();
            self.read_digits(&mut s);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            s.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.advance();
            }
            self.read_digits(&mut s);
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error("Identifier directly after number"));
        }
        s.parse()
            .map(Token::Num)
            .map_err(|_| self.error("Invalid number"))
    }

    /// Decimal digits, `_` separators dropped.
    fn read_digits(&mut self, s: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            if c != '_' {
                s.push(c);
            }
            self.advance();
        }
    }

    /// Decode one escape sequence; the backslash is already consumed.
    fn read_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.advance() else {
            return Err(self.error("Unterminated string constant"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.read_hex(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("Invalid escape"))?);
            }
            'u' => {
                let code = if self.eat('{') {
                    let mut hex = String::new();
                    while let Some(c) = self.peek().filter(|c| *c != '}') {
                        hex.push(c);
                        self.advance();
                    }
                    if !self.eat('}') {
                        return Err(self.error("Invalid Unicode escape sequence"));
                    }
                    u32::from_str_radix(&hex, 16)
                        .map_err(|_| self.error("Invalid Unicode escape sequence"))?
                } else {
                    self.read_hex(4)?
                };
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex(&mut self, len: usize) -> Result<u32, ParseError> {
        let mut hex = String::new();
        for _ in 0..len {
            match self.peek().filter(char::is_ascii_hexdigit) {
                Some(c) => {
                    hex.push(c);
                    self.advance();
                }
                None => return Err(self.error("Bad character escape sequence")),
            }
        }
        u32::from_str_radix(&hex, 16).map_err(|_| self.error("Bad character escape sequence"))
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.error("Unterminated string constant")),
                Some('\\') => self.read_escape(&mut s)?,
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_template(&mut self) -> Result<Token, ParseError> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut current = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated template")),
                Some('`') => {
                    quasis.push(current);
                    return Ok(Token::Template { quasis, exprs });
                }
                Some('\\') => self.read_escape(&mut current)?,
                Some('$') if self.eat('{') => {
                    quasis.push(std::mem::take(&mut current));
                    exprs.push(self.read_interpolation()?);
                }
                Some(c) => current.push(c),
            }
        }
    }

    /// Tokens up to the `}` closing a `${`, terminated with `Eof`.
    fn read_interpolation(&mut self) -> Result<Vec<Spanned>, ParseError> {
        if self.templates >= MAX_NESTING {
            return Err(self.error("Expression nested too deeply"));
        }
        self.templates += 1;
        let out = ensure_sufficient_stack(|| self.interpolation_tokens());
        self.templates -= 1;
        out
    }

    fn interpolation_tokens(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let saved = std::mem::replace(&mut self.after_operand, false);
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.next_token()?;
            match tok.token {
                Token::Eof => return Err(self.error("Unterminated template")),
                Token::Punct("{") => depth += 1,
                Token::Punct("}") if depth == 0 => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        ..tok
                    });
                    break;
                }
                Token::Punct("}") => depth -= 1,
                _ => {}
            }
            tokens.push(tok);
        }
        self.after_operand = saved;
        Ok(tokens)
    }

    fn read_regex(&mut self) -> Result<Token, ParseError> {
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(self.error("Unterminated regular expression"))
                }
                Some('\\') => {
                    pattern.push('\\');
                    if let Some(c) = self.advance() {
                        pattern.push(c);
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_part(*c)) {
            flags.push(c);
            self.advance();
        }
        Ok(Token::Regex { pattern, flags })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize `src`.  The result always ends with [`Token::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        let done = tok.token == Token::Eof;
        tokens.push(tok);
        if done {
            return Ok(tokens);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
