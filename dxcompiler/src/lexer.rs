//! Tokenizer for preprocessed HLSL
//!
//! Understands the `#line` markers the preprocessor writes so every token
//! carries the file and line it came from.

use crate::diagnostic::{Diagnostic, SourceLocation, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    Str,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub file: usize,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TokenStream {
    pub tokens: Vec<Token>,
    pub files: Vec<String>,
}

impl TokenStream {
    pub fn location(&self, token: &Token) -> SourceLocation {
        let file = self.files.get(token.file).cloned().unwrap_or_default();
        SourceLocation::new(file, token.line, token.column)
    }
}

const PUNCTUATORS: [&str; 22] = [
    "<<=", ">>=", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "<<", ">>", "::", "->",
];

struct Cursor<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: usize,
    stream: &'a mut TokenStream,
}

impl Cursor<'_> {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn location(&self) -> SourceLocation {
        let file = self.stream.files.get(self.file).cloned().unwrap_or_default();
        SourceLocation::new(file, self.line, self.column)
    }

    fn at_line_start(&self) -> bool {
        self.chars[..self.pos]
            .iter()
            .rev()
            .take_while(|c| **c != '\n')
            .all(|c| c.is_whitespace())
    }

    fn rest_of_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn file_index(&mut self, name: &str) -> usize {
        match self.stream.files.iter().position(|f| f == name) {
            Some(index) => index,
            None => {
                self.stream.files.push(name.to_string());
                self.stream.files.len() - 1
            }
        }
    }

    /// Applies `#line N "file"`; the line after the marker is line N.
    fn line_marker(&mut self, start: SourceLocation) -> Result<(), Diagnostic> {
        let text = self.rest_of_line();
        let body = text.trim_start_matches('#').trim_start();
        let Some(args) = body.strip_prefix("line") else {
            return Err(Diagnostic::error(
                Stage::Compile,
                format!("unexpected preprocessor directive '{}'", text.trim()),
            )
            .at(start));
        };
        let args = args.trim();
        let (number, file) = match args.split_once(char::is_whitespace) {
            Some((n, f)) => (n, Some(f.trim().trim_matches('"'))),
            None => (args, None),
        };
        let line: u32 = number.parse().map_err(|_| {
            Diagnostic::error(Stage::Compile, "malformed #line marker").at(start.clone())
        })?;
        if let Some(file) = file {
            self.file = self.file_index(file);
        }
        if self.peek(0) == Some('\n') {
            self.bump();
        }
        self.line = line;
        self.column = 1;
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, text: String, line: u32, column: u32) {
        let file = self.file;
        self.stream.tokens.push(Token {
            kind,
            text,
            file,
            line,
            column,
        });
    }
}

/// Splits source text into tokens, skipping comments and whitespace.
pub(crate) fn tokenize(text: &str, file_name: &str) -> Result<TokenStream, Diagnostic> {
    let mut stream = TokenStream::default();
    stream.files.push(file_name.to_string());
    let mut cur = Cursor {
        chars: text.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        file: 0,
        stream: &mut stream,
    };

    while let Some(c) = cur.peek(0) {
        let (line, column) = (cur.line, cur.column);
        if c.is_whitespace() {
            cur.bump();
        } else if c == '#' && cur.at_line_start() {
            let start = cur.location();
            cur.line_marker(start)?;
        } else if c == '/' && cur.peek(1) == Some('/') {
            cur.rest_of_line();
        } else if c == '/' && cur.peek(1) == Some('*') {
            let start = cur.location();
            cur.bump();
            cur.bump();
            loop {
                match cur.bump() {
                    Some('*') if cur.peek(0) == Some('/') => {
                        cur.bump();
                        break;
                    }
                    Some(_) => {}
                    None => {
                        return Err(
                            Diagnostic::error(Stage::Compile, "unterminated comment").at(start)
                        );
                    }
                }
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(c) = cur.peek(0).filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                ident.push(c);
                cur.bump();
            }
            cur.push(TokenKind::Ident, ident, line, column);
        } else if c.is_ascii_digit() || (c == '.' && cur.peek(1).is_some_and(|d| d.is_ascii_digit()))
        {
            let mut number = String::new();
            while let Some(c) = cur.peek(0) {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                    number.push(c);
                    cur.bump();
                } else if (c == '+' || c == '-')
                    && number.ends_with(['e', 'E'])
                    && !number.starts_with("0x")
                {
                    number.push(c);
                    cur.bump();
                } else {
                    break;
                }
            }
            cur.push(TokenKind::Number, number, line, column);
        } else if c == '"' {
            let start = cur.location();
            let mut literal = String::new();
            literal.push('"');
            cur.bump();
            loop {
                match cur.bump() {
                    Some('\\') => {
                        literal.push('\\');
                        if let Some(escaped) = cur.bump() {
                            literal.push(escaped);
                        }
                    }
                    Some('"') => {
                        literal.push('"');
                        break;
                    }
                    Some('\n') | None => {
                        return Err(Diagnostic::error(
                            Stage::Compile,
                            "missing terminating '\"' character",
                        )
                        .at(start));
                    }
                    Some(other) => literal.push(other),
                }
            }
            cur.push(TokenKind::Str, literal, line, column);
        } else {
            let rest: String = cur.chars[cur.pos..cur.chars.len().min(cur.pos + 3)]
                .iter()
                .collect();
            let punct = PUNCTUATORS
                .iter()
                .find(|p| rest.starts_with(**p))
                .map(|p| p.to_string())
                .unwrap_or_else(|| c.to_string());
            for _ in 0..punct.chars().count() {
                cur.bump();
            }
            cur.push(TokenKind::Punct, punct, line, column);
        }
    }

    Ok(stream)
}

/// Joins tokens back into compact expression text
pub(crate) fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            let tight_after = matches!(p.text.as_str(), "(" | "[" | "." | "!" | "~" | "::");
            let tight_before = matches!(
                token.text.as_str(),
                ")" | "]" | "," | "." | ";" | "::" | "++" | "--"
            ) || (token.is("(") && p.kind == TokenKind::Ident)
                || (token.is("[") && (p.kind == TokenKind::Ident || p.is("]") || p.is(")")));
            let before = out[..out.len() - p.text.len()].trim_end();
            let unary = matches!(p.text.as_str(), "-" | "+" | "++" | "--")
                && !matches!(
                    before.chars().last(),
                    Some(c) if c.is_alphanumeric() || c == '_' || c == ')' || c == ']'
                );
            if !(tight_after || tight_before || unary) {
                out.push(' ');
            }
        }
        out.push_str(&token.text);
        prev = Some(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(stream: &TokenStream) -> Vec<&str> {
        stream.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        let stream = tokenize("float4 c = a.xyzw * 2.0e-1; // done", "t.hlsl").unwrap();
        assert_eq!(
            texts(&stream),
            ["float4", "c", "=", "a", ".", "xyzw", "*", "2.0e-1", ";"]
        );
    }

    #[test]
    fn test_line_markers() {
        let text = "#line 1 \"main.hlsl\"\na\n#line 10 \"inc.hlsl\"\nb\n";
        let stream = tokenize(text, "main.hlsl").unwrap();
        let b = &stream.tokens[1];
        assert_eq!(b.line, 10);
        assert_eq!(stream.files[b.file], "inc.hlsl");
        assert_eq!(stream.tokens[0].line, 1);
    }

    #[test]
    fn test_multi_char_punct() {
        let stream = tokenize("a <<= b && c->d", "t").unwrap();
        assert_eq!(texts(&stream), ["a", "<<=", "b", "&&", "c", "->", "d"]);
    }

    #[test]
    fn test_render() {
        let stream = tokenize("saturate( a.x * -b [ 2 ] , c )", "t").unwrap();
        assert_eq!(render(&stream.tokens), "saturate(a.x * -b[2], c)");
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("\"abc\n", "t").is_err());
    }
}
