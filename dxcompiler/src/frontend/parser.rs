//! Declaration and statement parser
//!
//! Expressions are not parsed into trees; they are kept as token spans and
//! checked and lowered token by token.

use super::builtins::{QUALIFIERS, is_builtin_type};
use crate::diagnostic::{Diagnostic, Diagnostics, Stage};
use crate::lexer::{Token, TokenKind, TokenStream};
use std::collections::HashSet;
use std::ops::Range;

pub(crate) type Span = Range<usize>;

/// Marker for an error that was already reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reported;

type PResult<T> = Result<T, Reported>;

/// Keywords that start a statement and never appear inside an expression
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "if", "else", "for", "while", "do", "switch", "case", "default", "break",
    "continue", "discard",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Register {
    pub letter: char,
    pub slot: u32,
    pub space: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeSpec {
    /// Base name with template arguments, e.g. `Texture2D<float4>`
    pub name: String,
    pub base: String,
    pub template: Option<String>,
    /// `unorm` or `snorm` inside the template
    pub norm: Option<String>,
    pub qualifiers: Vec<String>,
}

impl TypeSpec {
    pub fn has(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|q| q == qualifier)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FieldDecl {
    pub ty: TypeSpec,
    pub name: String,
    pub semantic: Option<String>,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub(crate) struct BufferDecl {
    pub keyword: String,
    pub name: String,
    pub register: Option<Register>,
    pub fields: Vec<FieldDecl>,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct VarDecl {
    pub ty: TypeSpec,
    pub name: String,
    pub array: Option<u32>,
    pub register: Option<Register>,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub name: String,
    pub args: Vec<Span>,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ParamDecl {
    pub ty: TypeSpec,
    pub name: String,
    pub semantic: Option<String>,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionDecl {
    pub attributes: Vec<Attribute>,
    pub return_type: TypeSpec,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub semantic: Option<String>,
    pub body: Vec<Stmt>,
    pub token: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopKind {
    For,
    While,
    DoWhile,
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Decl {
        ty: TypeSpec,
        name: String,
        array: Option<u32>,
        init: Option<Span>,
        token: usize,
    },
    Expr(Span),
    Return {
        value: Option<Span>,
        token: usize,
    },
    If {
        cond: Span,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
        token: usize,
    },
    Loop {
        kind: LoopKind,
        init: Vec<Stmt>,
        cond: Option<Span>,
        step: Option<Span>,
        body: Vec<Stmt>,
        token: usize,
    },
    Break(usize),
    Continue(usize),
    Discard(usize),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Program {
    pub structs: Vec<StructDecl>,
    pub buffers: Vec<BufferDecl>,
    pub variables: Vec<VarDecl>,
    pub functions: Vec<FunctionDecl>,
}

enum Annotation {
    Register(Register),
    Semantic(String),
    PackOffset,
}

fn closing_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

/// Reports unbalanced brackets; returns false if any were found
pub(crate) fn check_delimiters(stream: &TokenStream, diagnostics: &mut Diagnostics) -> bool {
    let mut open: Vec<usize> = Vec::new();
    for (index, token) in stream.tokens.iter().enumerate() {
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text.as_str() {
            "(" | "[" | "{" => open.push(index),
            ")" | "]" | "}" => match open.pop() {
                Some(o) if closing_for(&stream.tokens[o].text) == token.text => {}
                Some(o) => {
                    let expected = closing_for(&stream.tokens[o].text);
                    diagnostics.push(
                        Diagnostic::error(Stage::Compile, format!("expected '{expected}'"))
                            .at(stream.location(token)),
                    );
                    return false;
                }
                None => {
                    diagnostics.push(
                        Diagnostic::error(
                            Stage::Compile,
                            format!("extraneous closing '{}'", token.text),
                        )
                        .at(stream.location(token)),
                    );
                    return false;
                }
            },
            _ => {}
        }
    }
    if let Some(o) = open.pop() {
        let token = &stream.tokens[o];
        diagnostics.push(
            Diagnostic::error(
                Stage::Compile,
                format!(
                    "expected '{}' to match this '{}'",
                    closing_for(&token.text),
                    token.text
                ),
            )
            .at(stream.location(token)),
        );
        return false;
    }
    true
}

pub(crate) struct Parser<'a> {
    stream: &'a TokenStream,
    pos: usize,
    structs: HashSet<String>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a TokenStream, diagnostics: &'a mut Diagnostics) -> Self {
        Parser {
            stream,
            pos: 0,
            structs: HashSet::new(),
            diagnostics,
        }
    }

    fn tokens(&self) -> &'a [Token] {
        &self.stream.tokens
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens().get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens().get(self.pos + ahead)
    }

    fn at(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is(text))
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&mut self, index: usize, message: impl Into<String>) -> Reported {
        let tokens = self.tokens();
        let mut diagnostic = Diagnostic::error(Stage::Compile, message);
        if let Some(token) = tokens.get(index).or(tokens.last()) {
            diagnostic = diagnostic.at(self.stream.location(token));
        }
        self.diagnostics.push(diagnostic);
        Reported
    }

    fn expect(&mut self, text: &str) -> PResult<usize> {
        if self.eat(text) {
            return Ok(self.pos - 1);
        }
        let found = self
            .peek()
            .map(|t| format!(", found '{}'", t.text))
            .unwrap_or_default();
        Err(self.error(self.pos, format!("expected '{text}'{found}")))
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, usize)> {
        match self.peek() {
            Some(t) if t.is_ident() => {
                self.pos += 1;
                Ok((t.text.clone(), self.pos - 1))
            }
            _ => Err(self.error(self.pos, format!("expected {what}"))),
        }
    }

    /// Span from the current token up to, not including, the first
    /// top-level token in `terms`.
    ///
    /// A statement keyword or an unmatched closing delimiter ends the span
    /// early and is reported as a missing terminator.
    fn span_until(&mut self, terms: &[&str]) -> PResult<Span> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            if depth == 0 && t.kind == TokenKind::Punct && terms.contains(&t.text.as_str()) {
                return Ok(start..self.pos);
            }
            if t.is_ident() && STATEMENT_KEYWORDS.contains(&t.text.as_str()) {
                return Err(self.missing_terminator(terms));
            }
            match t.text.as_str() {
                "(" | "[" | "{" if t.kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" if t.kind == TokenKind::Punct => {
                    if depth == 0 {
                        return Err(self.missing_terminator(terms));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.missing_terminator(terms))
    }

    /// Reports the closing member of `terms` as missing at the current token
    fn missing_terminator(&mut self, terms: &[&str]) -> Reported {
        let term = terms.last().copied().unwrap_or(";");
        let found = self
            .peek()
            .map(|t| format!(", found '{}'", t.text))
            .unwrap_or_default();
        self.error(self.pos, format!("expected '{term}'{found}"))
    }

    pub fn parse_program(mut self) -> PResult<Program> {
        let mut program = Program::default();
        let mut attributes = Vec::new();
        while let Some(t) = self.peek() {
            match t.text.as_str() {
                ";" => self.pos += 1,
                "struct" => {
                    let decl = self.parse_struct()?;
                    self.structs.insert(decl.name.clone());
                    program.structs.push(decl);
                }
                "cbuffer" | "tbuffer" => program.buffers.push(self.parse_buffer()?),
                "[" => attributes.extend(self.parse_attributes()?),
                "typedef" | "namespace" | "interface" | "class" | "template" | "enum" => {
                    return Err(self.error(
                        self.pos,
                        format!("'{}' declarations are not supported", t.text),
                    ));
                }
                _ => self.parse_declaration(std::mem::take(&mut attributes), &mut program)?,
            }
        }
        Ok(program)
    }

    fn parse_type(&mut self) -> PResult<TypeSpec> {
        let mut qualifiers = Vec::new();
        while let Some(t) = self.peek() {
            if t.is_ident() && QUALIFIERS.contains(&t.text.as_str()) {
                qualifiers.push(t.text.clone());
                self.pos += 1;
            } else {
                break;
            }
        }
        let (base, _) = self.expect_ident("a type name")?;
        let mut template = None;
        let mut norm = None;
        if self.at("<") {
            let open = self.pos;
            self.pos += 1;
            let mut depth = 1i32;
            let mut parts = String::new();
            loop {
                let Some(t) = self.peek() else {
                    return Err(self.error(open, "expected '>' to close template arguments"));
                };
                self.pos += 1;
                match t.text.as_str() {
                    "<" => depth += 1,
                    ">" => depth -= 1,
                    ">>" => depth -= 2,
                    _ => {}
                }
                if depth <= 0 {
                    if t.is(">>") && depth == 0 {
                        parts.push('>');
                    }
                    break;
                }
                if t.is("unorm") || t.is("snorm") {
                    norm = Some(t.text.clone());
                } else {
                    parts.push_str(&t.text);
                }
            }
            template = Some(parts);
        }
        let name = match &template {
            Some(args) => format!("{base}<{args}>"),
            None => base.clone(),
        };
        Ok(TypeSpec {
            name,
            base,
            template,
            norm,
            qualifiers,
        })
    }

    fn parse_array_suffix(&mut self) -> PResult<Option<u32>> {
        let mut size: Option<u32> = None;
        while self.at("[") {
            let open = self.pos;
            self.pos += 1;
            let n = match self.peek() {
                Some(t) if t.kind == TokenKind::Number => t
                    .text
                    .trim_end_matches(['u', 'U'])
                    .parse::<u32>()
                    .map_err(|_| self.error(self.pos, "array size must be an integer literal"))?,
                _ => {
                    return Err(self.error(open, "array size must be an integer literal"));
                }
            };
            self.pos += 1;
            self.expect("]")?;
            size = Some(size.unwrap_or(1).saturating_mul(n));
        }
        Ok(size)
    }

    fn parse_annotation(&mut self) -> PResult<Annotation> {
        let (name, _) = self.expect_ident("a semantic or register")?;
        match name.as_str() {
            "register" => {
                self.expect("(")?;
                let (spec, spec_index) = self.expect_ident("a register")?;
                let mut chars = spec.chars();
                let letter = chars.next().unwrap_or('?');
                let slot = chars
                    .as_str()
                    .parse::<u32>()
                    .map_err(|_| self.error(spec_index, format!("invalid register '{spec}'")))?;
                let mut space = 0;
                if self.eat(",") {
                    let (space_spec, space_index) = self.expect_ident("a register space")?;
                    space = space_spec
                        .strip_prefix("space")
                        .and_then(|n| n.parse::<u32>().ok())
                        .ok_or_else(|| {
                            self.error(space_index, format!("invalid register space '{space_spec}'"))
                        })?;
                }
                self.expect(")")?;
                Ok(Annotation::Register(Register {
                    letter: letter.to_ascii_lowercase(),
                    slot,
                    space,
                }))
            }
            "packoffset" => {
                self.expect("(")?;
                self.span_until(&[")"])?;
                self.expect(")")?;
                Ok(Annotation::PackOffset)
            }
            _ => Ok(Annotation::Semantic(name)),
        }
    }

    fn parse_fields(&mut self) -> PResult<Vec<FieldDecl>> {
        self.expect("{")?;
        let mut fields = Vec::new();
        while !self.at("}") {
            if self.eat(";") {
                continue;
            }
            let ty = self.parse_type()?;
            loop {
                let (name, token) = self.expect_ident("a member name")?;
                if self.at("(") {
                    return Err(self.error(self.pos, "member functions are not supported"));
                }
                self.parse_array_suffix()?;
                let mut semantic = None;
                while self.eat(":") {
                    if let Annotation::Semantic(s) = self.parse_annotation()? {
                        semantic = Some(s);
                    }
                }
                fields.push(FieldDecl {
                    ty: ty.clone(),
                    name,
                    semantic,
                    token,
                });
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(";")?;
        }
        self.expect("}")?;
        Ok(fields)
    }

    fn parse_struct(&mut self) -> PResult<StructDecl> {
        self.expect("struct")?;
        let (name, _) = self.expect_ident("a struct name")?;
        let fields = self.parse_fields()?;
        self.expect(";")?;
        Ok(StructDecl { name, fields })
    }

    fn parse_buffer(&mut self) -> PResult<BufferDecl> {
        let token = self.pos;
        let keyword = self.tokens()[token].text.clone();
        self.pos += 1;
        let (name, _) = self.expect_ident("a buffer name")?;
        let mut register = None;
        while self.eat(":") {
            if let Annotation::Register(r) = self.parse_annotation()? {
                register = Some(r);
            }
        }
        let fields = self.parse_fields()?;
        self.eat(";");
        Ok(BufferDecl {
            keyword,
            name,
            register,
            fields,
            token,
        })
    }

    fn parse_attributes(&mut self) -> PResult<Vec<Attribute>> {
        self.expect("[")?;
        let mut attributes = Vec::new();
        loop {
            let (name, token) = self.expect_ident("an attribute name")?;
            let mut args = Vec::new();
            if self.eat("(") {
                while !self.at(")") {
                    args.push(self.span_until(&[",", ")"])?);
                    self.eat(",");
                }
                self.expect(")")?;
            }
            attributes.push(Attribute { name, args, token });
            if !self.eat(",") {
                break;
            }
        }
        self.expect("]")?;
        Ok(attributes)
    }

    fn parse_declaration(&mut self, attributes: Vec<Attribute>, program: &mut Program) -> PResult<()> {
        let ty = self.parse_type()?;
        let (mut name, mut token) = self.expect_ident("a declaration name")?;
        if self.at("(") {
            if let Some(function) = self.parse_function(attributes, ty, name, token)? {
                program.functions.push(function);
            }
            return Ok(());
        }

        loop {
            let array = self.parse_array_suffix()?;
            let mut register = None;
            while self.eat(":") {
                if let Annotation::Register(r) = self.parse_annotation()? {
                    register = Some(r);
                }
            }
            if self.eat("=") {
                self.span_until(&[",", ";"])?;
            }
            program.variables.push(VarDecl {
                ty: ty.clone(),
                name,
                array,
                register,
                token,
            });
            if !self.eat(",") {
                break;
            }
            (name, token) = self.expect_ident("a declaration name")?;
        }
        self.expect(";")?;
        Ok(())
    }

    fn parse_function(
        &mut self,
        attributes: Vec<Attribute>,
        return_type: TypeSpec,
        name: String,
        token: usize,
    ) -> PResult<Option<FunctionDecl>> {
        self.expect("(")?;
        let mut params = Vec::new();
        if self.at("void") && self.peek_at(1).is_some_and(|t| t.is(")")) {
            self.pos += 1;
        }
        while !self.at(")") {
            let ty = self.parse_type()?;
            let (param_name, param_token) = self.expect_ident("a parameter name")?;
            self.parse_array_suffix()?;
            let mut semantic = None;
            while self.eat(":") {
                if let Annotation::Semantic(s) = self.parse_annotation()? {
                    semantic = Some(s);
                }
            }
            if self.eat("=") {
                self.span_until(&[",", ")"])?;
            }
            params.push(ParamDecl {
                ty,
                name: param_name,
                semantic,
                token: param_token,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;

        let mut semantic = None;
        while self.eat(":") {
            if let Annotation::Semantic(s) = self.parse_annotation()? {
                semantic = Some(s);
            }
        }
        if self.eat(";") {
            return Ok(None);
        }
        let body = self.parse_block()?;
        Ok(Some(FunctionDecl {
            attributes,
            return_type,
            name,
            params,
            semantic,
            body,
            token,
        }))
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect("{")?;
        let mut stmts = Vec::new();
        while !self.at("}") {
            if self.peek().is_none() {
                return Err(self.error(self.pos, "expected '}'"));
            }
            self.parse_statement(&mut stmts)?;
        }
        self.expect("}")?;
        Ok(stmts)
    }

    /// One statement as a list, unwrapping a braced block
    fn parse_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        self.parse_statement(&mut stmts)?;
        if let [Stmt::Block(_)] = stmts.as_slice() {
            if let Some(Stmt::Block(inner)) = stmts.pop() {
                return Ok(inner);
            }
        }
        Ok(stmts)
    }

    fn is_decl_start(&self) -> bool {
        let tokens = self.tokens();
        let mut i = self.pos;
        while tokens
            .get(i)
            .is_some_and(|t| t.is_ident() && QUALIFIERS.contains(&t.text.as_str()))
        {
            i += 1;
        }
        let Some(t) = tokens.get(i).filter(|t| t.is_ident()) else {
            return false;
        };
        if !is_builtin_type(&t.text) && !self.structs.contains(&t.text) {
            return false;
        }
        tokens
            .get(i + 1)
            .is_some_and(|next| next.is_ident() || next.is("<"))
    }

    fn parse_local_decl(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        let ty = self.parse_type()?;
        loop {
            let (name, token) = self.expect_ident("a variable name")?;
            let array = self.parse_array_suffix()?;
            let init = if self.eat("=") {
                Some(self.span_until(&[",", ";"])?)
            } else {
                None
            };
            out.push(Stmt::Decl {
                ty: ty.clone(),
                name,
                array,
                init,
                token,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(";")?;
        Ok(())
    }

    fn parenthesized(&mut self) -> PResult<Span> {
        self.expect("(")?;
        let span = self.span_until(&[")"])?;
        self.expect(")")?;
        Ok(span)
    }

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        let Some(t) = self.peek() else {
            return Err(self.error(self.pos, "expected a statement"));
        };
        let token = self.pos;
        match t.text.as_str() {
            "{" => out.push(Stmt::Block(self.parse_block()?)),
            ";" => self.pos += 1,
            "[" => {
                // [unroll], [loop], [branch] and friends only steer codegen
                self.pos += 1;
                self.span_until(&["]"])?;
                self.expect("]")?;
                self.parse_statement(out)?;
            }
            "return" => {
                self.pos += 1;
                let value = if self.at(";") {
                    None
                } else {
                    Some(self.span_until(&[";"])?)
                };
                self.expect(";")?;
                out.push(Stmt::Return { value, token });
            }
            "if" => {
                self.pos += 1;
                let cond = self.parenthesized()?;
                let then = self.parse_body()?;
                let otherwise = if self.eat("else") {
                    Some(self.parse_body()?)
                } else {
                    None
                };
                out.push(Stmt::If {
                    cond,
                    then,
                    otherwise,
                    token,
                });
            }
            "for" => {
                self.pos += 1;
                self.expect("(")?;
                let mut init = Vec::new();
                if self.is_decl_start() {
                    self.parse_local_decl(&mut init)?;
                } else {
                    if !self.at(";") {
                        init.push(Stmt::Expr(self.span_until(&[";"])?));
                    }
                    self.expect(";")?;
                }
                let cond = if self.at(";") {
                    None
                } else {
                    Some(self.span_until(&[";"])?)
                };
                self.expect(";")?;
                let step = if self.at(")") {
                    None
                } else {
                    Some(self.span_until(&[")"])?)
                };
                self.expect(")")?;
                let body = self.parse_body()?;
                out.push(Stmt::Loop {
                    kind: LoopKind::For,
                    init,
                    cond,
                    step,
                    body,
                    token,
                });
            }
            "while" => {
                self.pos += 1;
                let cond = self.parenthesized()?;
                let body = self.parse_body()?;
                out.push(Stmt::Loop {
                    kind: LoopKind::While,
                    init: Vec::new(),
                    cond: Some(cond),
                    step: None,
                    body,
                    token,
                });
            }
            "do" => {
                self.pos += 1;
                let body = self.parse_body()?;
                self.expect("while")?;
                let cond = self.parenthesized()?;
                self.expect(";")?;
                out.push(Stmt::Loop {
                    kind: LoopKind::DoWhile,
                    init: Vec::new(),
                    cond: Some(cond),
                    step: None,
                    body,
                    token,
                });
            }
            "break" | "continue" | "discard" => {
                self.pos += 1;
                self.expect(";")?;
                out.push(match t.text.as_str() {
                    "break" => Stmt::Break(token),
                    "continue" => Stmt::Continue(token),
                    _ => Stmt::Discard(token),
                });
            }
            "switch" | "case" | "default" | "goto" => {
                return Err(self.error(
                    token,
                    format!("'{}' statements are not supported", t.text),
                ));
            }
            _ if self.is_decl_start() => self.parse_local_decl(out)?,
            _ => {
                let expr = self.span_until(&[";"])?;
                self.expect(";")?;
                out.push(Stmt::Expr(expr));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(text: &str) -> (Option<Program>, Diagnostics) {
        let stream = tokenize(text, "t.hlsl").unwrap();
        let mut diagnostics = Diagnostics::new();
        let program = if check_delimiters(&stream, &mut diagnostics) {
            Parser::new(&stream, &mut diagnostics).parse_program().ok()
        } else {
            None
        };
        (program, diagnostics)
    }

    #[test]
    fn test_declarations() {
        let (program, diags) = parse(
            "struct V { float4 pos : SV_Position; float2 uv : TEXCOORD0; };\n\
             cbuffer P : register(b1) { float4x4 mvp; float scale; };\n\
             Texture2D<float4> tex : register(t0, space1);\n\
             SamplerState samp;\n\
             static const float PI = 3.14;\n\
             [numthreads(8, 8, 1)] void main() {}\n",
        );
        assert!(diags.is_empty(), "{}", diags.render());
        let program = program.unwrap();
        assert_eq!(program.structs[0].fields.len(), 2);
        assert_eq!(program.structs[0].fields[1].semantic.as_deref(), Some("TEXCOORD0"));
        assert_eq!(
            program.buffers[0].register,
            Some(Register { letter: 'b', slot: 1, space: 0 })
        );
        assert_eq!(program.variables.len(), 3);
        assert_eq!(program.variables[0].ty.name, "Texture2D<float4>");
        assert_eq!(program.variables[0].register.map(|r| r.space), Some(1));
        assert!(program.variables[2].ty.has("static"));
        let f = &program.functions[0];
        assert_eq!(f.attributes[0].name, "numthreads");
        assert_eq!(f.attributes[0].args.len(), 3);
    }

    #[test]
    fn test_statements() {
        let (program, diags) = parse(
            "float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
               float4 c = 0, d;\n\
               [unroll] for (int i = 0; i < 4; i++) { c += i; }\n\
               if (c.x > 1) discard; else { c = 1; }\n\
               do { c *= 2; } while (c.x < 8);\n\
               return c;\n\
             }\n",
        );
        assert!(diags.is_empty(), "{}", diags.render());
        let body = &program.unwrap().functions[0].body;
        assert!(matches!(body[0], Stmt::Decl { .. }));
        assert!(matches!(body[1], Stmt::Decl { init: None, .. }));
        assert!(matches!(&body[2], Stmt::Loop { kind: LoopKind::For, init, .. } if init.len() == 1));
        assert!(matches!(&body[3], Stmt::If { otherwise: Some(_), .. }));
        assert!(matches!(body[4], Stmt::Loop { kind: LoopKind::DoWhile, .. }));
        assert!(matches!(body[5], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_unbalanced_delimiters() {
        let (program, diags) = parse("void main() { if (x { } }");
        assert!(program.is_none());
        assert!(diags.has_errors());
        let (_, diags) = parse("void main() {");
        assert!(diags.render().contains("expected '}' to match this '{'"));
    }

    #[test]
    fn test_missing_semicolon() {
        let (program, diags) = parse("void main() { float x = 1 }");
        assert!(program.is_none());
        assert!(diags.render().contains("expected ';', found '}'"));

        let (program, diags) = parse("void main() { float x = 1 return; }");
        assert!(program.is_none());
        let text = diags.render();
        assert!(text.contains("1:27: error: expected ';', found 'return'"), "{text}");

        let (_, diags) = parse("void main() { x = f(1, 2 }");
        assert!(diags.render().contains("expected ')'"));
    }
}
