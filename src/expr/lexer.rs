//! Tokenizer for the sandboxed expression grammar.

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // punctuation / operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    At,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Comma,
    Colon,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    True,
    False,
    Eof,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct LexError(pub String);

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Tokenizes the entire input. Returns an error on malformed literals.
    pub fn tokenize(mut self) -> Result<Vec<Tok>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else {
                out.push(Tok::Eof);
                break;
            };
            let tok = match c {
                b'0'..=b'9' => self.number()?,
                b'.' if self.src.get(self.pos + 1).is_some_and(u8::is_ascii_digit) => {
                    self.number()?
                }
                b'"' | b'\'' => self.string(c)?,
                b'+' => { self.bump(); Tok::Plus }
                b'-' => { self.bump(); Tok::Minus }
                b'*' => {
                    self.bump();
                    if self.peek() == Some(b'*') { self.bump(); Tok::StarStar } else { Tok::Star }
                }
                b'/' => {
                    self.bump();
                    if self.peek() == Some(b'/') { self.bump(); Tok::SlashSlash } else { Tok::Slash }
                }
                b'%' => { self.bump(); Tok::Percent }
                b'@' => { self.bump(); Tok::At }
                b'=' => {
                    self.bump();
                    if self.peek() == Some(b'=') { self.bump(); Tok::Eq } else {
                        return Err(LexError("unexpected '='".into()));
                    }
                }
                b'!' => {
                    self.bump();
                    if self.peek() == Some(b'=') { self.bump(); Tok::Ne } else {
                        return Err(LexError("unexpected '!'".into()));
                    }
                }
                b'<' => {
                    self.bump();
                    if self.peek() == Some(b'=') { self.bump(); Tok::Le } else { Tok::Lt }
                }
                b'>' => {
                    self.bump();
                    if self.peek() == Some(b'=') { self.bump(); Tok::Ge } else { Tok::Gt }
                }
                b',' => { self.bump(); Tok::Comma }
                b':' => { self.bump(); Tok::Colon }
                b'.' => { self.bump(); Tok::Dot }
                b'(' => { self.bump(); Tok::LParen }
                b')' => { self.bump(); Tok::RParen }
                b'[' => { self.bump(); Tok::LBracket }
                b']' => { self.bump(); Tok::RBracket }
                c if c.is_ascii_alphabetic() || c == b'_' => self.ident(),
                other => return Err(LexError(format!("unexpected character '{}'", other as char))),
            };
            out.push(tok);
        }
        Ok(out)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Tok, LexError> {
        let start = self.pos;
        let mut is_float = false;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        if self.peek() == Some(b'.') && self.src.get(self.pos + 1) != Some(&b'.') {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            text.parse::<f64>().map(Tok::Float).map_err(|e| LexError(e.to_string()))
        } else {
            text.parse::<i64>().map(Tok::Int).map_err(|e| LexError(e.to_string()))
        }
    }

    fn string(&mut self, quote: u8) -> Result<Tok, LexError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError("unterminated string literal".into())),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'\\') => s.push('\\'),
                    Some(c) if c == quote => s.push(quote as char),
                    Some(c) => s.push(c as char),
                    None => return Err(LexError("unterminated string literal".into())),
                },
                Some(c) => s.push(c as char),
            }
        }
        Ok(Tok::Str(s))
    }

    fn ident(&mut self) -> Tok {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match text {
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "True" => Tok::True,
            "False" => Tok::False,
            other => Tok::Ident(other.to_string()),
        }
    }
}
