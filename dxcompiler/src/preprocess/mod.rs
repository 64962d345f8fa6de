//! HLSL preprocessor
//!
//! Handles comments, line splicing, object-like and function-like macros,
//! `#include`, conditional blocks and the usual pragmas. The output keeps
//! every source line in place and marks file changes with `#line`, so the
//! front end reports locations against the original files.

mod expr;

use crate::diagnostic::{Diagnostic, Diagnostics, SourceLocation, Stage};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::io;
use thiserror::Error;

/// Deepest allowed `#include` nesting
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// A loaded include file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Name the file was found under, used for locations and `#pragma once`
    pub name: String,
    /// File contents
    pub text: String,
}

/// Supplies the contents of `#include` files
pub trait IncludeLoader {
    /// Loads the include `name` written in a directive of `includer`.
    ///
    /// Returns `Ok(None)` if the file does not exist. Any I/O error aborts
    /// preprocessing.
    fn load(&mut self, name: &str, includer: &str) -> io::Result<Option<IncludedFile>>;
}

/// Preprocessed text plus everything reported along the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessOutput {
    /// Expanded text with `#line` markers
    pub text: String,
    /// Diagnostics in report order
    pub diagnostics: Diagnostics,
}

/// An include loader failed with an I/O error
#[derive(Error, Debug)]
#[error("failed to read include '{name}': {source}")]
pub struct IncludeIoError {
    /// Include name as written in the directive
    pub name: String,
    /// Underlying error
    #[source]
    pub source: io::Error,
    /// Diagnostics reported before the failure, the failure included
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Macro {
    params: Option<Vec<String>>,
    body: String,
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    active: bool,
    taken: bool,
    seen_else: bool,
    parent_active: bool,
    line: u32,
    column: u32,
}

struct Preprocessor<'a> {
    macros: HashMap<String, Macro>,
    loader: Option<&'a mut dyn IncludeLoader>,
    diagnostics: Diagnostics,
    once: HashSet<String>,
    out: String,
    depth: usize,
}

/// Runs the preprocessor over `source`.
///
/// `defines` are applied in order before the first line; a value of `None`
/// defines the macro as `1`.
pub fn preprocess(
    source: &str,
    source_name: &str,
    defines: &[(String, Option<String>)],
    loader: Option<&mut dyn IncludeLoader>,
) -> Result<PreprocessOutput, IncludeIoError> {
    let mut pp = Preprocessor {
        macros: HashMap::new(),
        loader,
        diagnostics: Diagnostics::new(),
        once: HashSet::new(),
        out: String::with_capacity(source.len()),
        depth: 0,
    };
    pp.define("__HLSL_VERSION", None, "2021");
    pp.define("__hlsl_dx_compiler", None, "1");
    for (name, value) in defines {
        pp.define(name, None, value.as_deref().unwrap_or("1"));
    }

    debug!("preprocessing {source_name} with {} defines", defines.len());
    match pp.process_file(source, source_name) {
        Ok(()) => Ok(PreprocessOutput {
            text: pp.out,
            diagnostics: pp.diagnostics,
        }),
        Err((name, source)) => Err(IncludeIoError {
            name,
            source,
            diagnostics: pp.diagnostics,
        }),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replaces comments with a space, keeping newlines so lines stay in place.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' && chars[i] != '\n' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() && chars[i] == '"' {
                    out.push('"');
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        out.push('\n');
                    }
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                out.push(' ');
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Splits a macro argument list starting at the `(` at `open`.
///
/// Returns the raw arguments and the index just past the closing `)`.
fn collect_args(chars: &[char], open: usize) -> Option<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                args.push(current.trim().to_string());
                return Some((args, i + 1));
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            '"' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        current.push(chars[i]);
                        i += 1;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    current.push('"');
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }
    None
}

/// Substitutes arguments into a function-like macro body
fn substitute(body: &str, params: &[String], raw: &[String], expanded: &[String]) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '#' && chars.get(i + 1) != Some(&'#') && !out.trim_end().ends_with('#') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let start = j;
            while j < chars.len() && is_ident_char(chars[j]) {
                j += 1;
            }
            let word: String = chars[start..j].iter().collect();
            if let Some(index) = params.iter().position(|p| *p == word) {
                out.push('"');
                out.push_str(&raw[index].replace('\\', "\\\\").replace('"', "\\\""));
                out.push('"');
                i = j;
                continue;
            }
        }
        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match params.iter().position(|p| *p == word) {
                Some(index) => {
                    let next: String = chars[i..].iter().collect();
                    let pasted = out.trim_end().ends_with("##") || next.trim_start().starts_with("##");
                    out.push_str(if pasted { &raw[index] } else { &expanded[index] });
                }
                None => out.push_str(&word),
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    paste_tokens(&out)
}

/// Removes `##` and the whitespace around it
fn paste_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(index) = rest.find("##") {
        out.push_str(rest[..index].trim_end());
        rest = rest[index + 2..].trim_start();
    }
    out.push_str(rest);
    out
}

impl Preprocessor<'_> {
    fn define(&mut self, name: &str, params: Option<Vec<String>>, body: &str) {
        self.macros.insert(
            name.to_string(),
            Macro {
                params,
                body: body.trim().to_string(),
            },
        );
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        trace!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Expands every macro in `text`, skipping those in `hidden`
    fn expand(&self, text: &str, hidden: &mut Vec<String>, errors: &mut Vec<String>) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                out.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    out.push('"');
                    i += 1;
                }
                continue;
            }
            if c.is_ascii_digit() {
                while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            if !is_ident_start(c) {
                out.push(c);
                i += 1;
                continue;
            }

            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let Some(m) = self.macros.get(&word).filter(|_| !hidden.contains(&word)) else {
                out.push_str(&word);
                continue;
            };

            match &m.params {
                None => {
                    hidden.push(word);
                    out.push_str(&self.expand(&m.body, hidden, errors));
                    hidden.pop();
                }
                Some(params) => {
                    let mut j = i;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if chars.get(j) != Some(&'(') {
                        out.push_str(&word);
                        continue;
                    }
                    let Some((mut raw, end)) = collect_args(&chars, j) else {
                        errors.push(format!(
                            "unterminated argument list invoking macro '{word}'"
                        ));
                        out.push_str(&word);
                        continue;
                    };
                    i = end;
                    if params.is_empty() && raw.len() == 1 && raw[0].is_empty() {
                        raw.clear();
                    }
                    if raw.len() != params.len() {
                        errors.push(format!(
                            "macro '{word}' requires {} arguments, but {} given",
                            params.len(),
                            raw.len()
                        ));
                        continue;
                    }
                    let expanded: Vec<String> = raw
                        .iter()
                        .map(|arg| self.expand(arg, hidden, errors))
                        .collect();
                    let body = substitute(&m.body, params, &raw, &expanded);
                    hidden.push(word);
                    out.push_str(&self.expand(&body, hidden, errors));
                    hidden.pop();
                }
            }
        }
        out
    }

    fn expand_line(&mut self, text: &str, location: &SourceLocation) -> String {
        let mut errors = Vec::new();
        let expanded = self.expand(text, &mut Vec::new(), &mut errors);
        for message in errors {
            self.report(Diagnostic::error(Stage::Preprocess, message).at(location.clone()));
        }
        expanded
    }

    /// Rewrites `defined X` and `defined(X)` to 1 or 0
    fn replace_defined(&self, text: &str) -> Result<String, String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            if !is_ident_start(chars[i]) {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word != "defined" {
                out.push_str(&word);
                continue;
            }
            let skip_ws = |mut k: usize| {
                while k < chars.len() && chars[k].is_whitespace() {
                    k += 1;
                }
                k
            };
            i = skip_ws(i);
            let paren = chars.get(i) == Some(&'(');
            if paren {
                i = skip_ws(i + 1);
            }
            let name_start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            if name_start == i {
                return Err("macro name missing after 'defined'".to_string());
            }
            let name: String = chars[name_start..i].iter().collect();
            if paren {
                i = skip_ws(i);
                if chars.get(i) != Some(&')') {
                    return Err("missing ')' after 'defined'".to_string());
                }
                i += 1;
            }
            out.push_str(if self.macros.contains_key(&name) { " 1 " } else { " 0 " });
        }
        Ok(out)
    }

    fn condition(&mut self, args: &str, location: &SourceLocation) -> bool {
        let result = self.replace_defined(args).and_then(|text| {
            let expanded = self.expand_line(&text, location);
            expr::evaluate(&expanded)
        });
        match result {
            Ok(value) => value != 0,
            Err(message) => {
                self.report(Diagnostic::error(Stage::Preprocess, message).at(location.clone()));
                false
            }
        }
    }

    fn process_file(&mut self, text: &str, name: &str) -> Result<(), (String, io::Error)> {
        self.out.push_str(&format!("#line 1 \"{name}\"\n"));
        let stripped = strip_comments(text);
        let mut physical: Vec<&str> = stripped
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        if physical.last() == Some(&"") {
            physical.pop();
        }

        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut index = 0;
        while index < physical.len() {
            let line_no = index as u32 + 1;
            let mut line = physical[index].to_string();
            let mut spliced = 0;
            while line.ends_with('\\') && index + 1 < physical.len() {
                line.pop();
                index += 1;
                spliced += 1;
                line.push_str(physical[index]);
            }
            index += 1;

            let active = conditionals.last().is_none_or(|c| c.active);
            let trimmed = line.trim_start();
            let column = (line.len() - trimmed.len()) as u32 + 1;
            let location = SourceLocation::new(name, line_no, column);

            let Some(directive_text) = trimmed.strip_prefix('#') else {
                if active {
                    let expanded = self.expand_line(&line, &location);
                    self.out.push_str(&expanded);
                }
                self.out.push_str(&"\n".repeat(1 + spliced));
                continue;
            };

            let directive_text = directive_text.trim_start();
            let split = directive_text
                .find(|c: char| !is_ident_char(c))
                .unwrap_or(directive_text.len());
            let (directive, args) = directive_text.split_at(split);
            let args = args.trim();

            match directive {
                "if" | "ifdef" | "ifndef" => {
                    let value = if !active {
                        false
                    } else if directive == "if" {
                        self.condition(args, &location)
                    } else {
                        let macro_name: String = args.chars().take_while(|c| is_ident_char(*c)).collect();
                        if macro_name.is_empty() {
                            self.report(
                                Diagnostic::error(Stage::Preprocess, "macro name missing")
                                    .at(location.clone()),
                            );
                        }
                        self.macros.contains_key(&macro_name) == (directive == "ifdef")
                    };
                    conditionals.push(Conditional {
                        active: active && value,
                        taken: value,
                        seen_else: false,
                        parent_active: active,
                        line: line_no,
                        column,
                    });
                }
                "elif" => match conditionals.last().copied() {
                    None => self.report(
                        Diagnostic::error(Stage::Preprocess, "#elif without #if").at(location.clone()),
                    ),
                    Some(top) if top.seen_else => self.report(
                        Diagnostic::error(Stage::Preprocess, "#elif after #else").at(location.clone()),
                    ),
                    Some(top) => {
                        let value = if top.taken || !top.parent_active {
                            false
                        } else {
                            self.condition(args, &location)
                        };
                        if let Some(frame) = conditionals.last_mut() {
                            frame.active = value;
                            frame.taken |= value;
                        }
                    }
                },
                "else" => match conditionals.last_mut() {
                    None => self.report(
                        Diagnostic::error(Stage::Preprocess, "#else without #if").at(location.clone()),
                    ),
                    Some(frame) if frame.seen_else => self.report(
                        Diagnostic::error(Stage::Preprocess, "#else after #else").at(location.clone()),
                    ),
                    Some(frame) => {
                        frame.active = frame.parent_active && !frame.taken;
                        frame.taken = true;
                        frame.seen_else = true;
                    }
                },
                "endif" => {
                    if conditionals.pop().is_none() {
                        self.report(
                            Diagnostic::error(Stage::Preprocess, "#endif without #if")
                                .at(location.clone()),
                        );
                    }
                }
                _ if !active => {}
                "" | "line" => {}
                "define" => self.define_directive(args, &location),
                "undef" => {
                    let macro_name: String = args.chars().take_while(|c| is_ident_char(*c)).collect();
                    if macro_name.is_empty() {
                        self.report(
                            Diagnostic::error(Stage::Preprocess, "macro name missing")
                                .at(location.clone()),
                        );
                    }
                    self.macros.remove(&macro_name);
                }
                "include" => {
                    if self.include_directive(args, name, &location)? {
                        let resume = line_no + spliced as u32 + 1;
                        self.out.push_str(&format!("#line {resume} \"{name}\"\n"));
                        continue;
                    }
                }
                "error" => {
                    let message = if args.is_empty() { "#error" } else { args };
                    self.report(Diagnostic::error(Stage::Preprocess, message).at(location.clone()));
                }
                "warning" => {
                    let message = if args.is_empty() { "#warning" } else { args };
                    self.report(Diagnostic::warning(Stage::Preprocess, message).at(location.clone()));
                }
                "pragma" => self.pragma_directive(args, name, &location),
                other => self.report(
                    Diagnostic::error(
                        Stage::Preprocess,
                        format!("invalid preprocessing directive '#{other}'"),
                    )
                    .at(location.clone()),
                ),
            }
            self.out.push_str(&"\n".repeat(1 + spliced));
        }

        for open in conditionals {
            self.report(
                Diagnostic::error(Stage::Preprocess, "unterminated conditional directive")
                    .at(SourceLocation::new(name, open.line, open.column)),
            );
        }
        Ok(())
    }

    fn define_directive(&mut self, args: &str, location: &SourceLocation) {
        let name: String = args.chars().take_while(|c| is_ident_char(*c)).collect();
        if name.is_empty() || !name.starts_with(is_ident_start) {
            self.report(Diagnostic::error(Stage::Preprocess, "macro name missing").at(location.clone()));
            return;
        }
        let rest = &args[name.len()..];
        let (params, body) = match rest.strip_prefix('(') {
            Some(list) => {
                let Some(close) = list.find(')') else {
                    self.report(
                        Diagnostic::error(Stage::Preprocess, "missing ')' in macro parameter list")
                            .at(location.clone()),
                    );
                    return;
                };
                let params: Vec<String> = list[..close]
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if params.iter().any(|p| !p.starts_with(is_ident_start) || !p.chars().all(is_ident_char)) {
                    self.report(
                        Diagnostic::error(Stage::Preprocess, "invalid macro parameter list")
                            .at(location.clone()),
                    );
                    return;
                }
                (Some(params), &list[close + 1..])
            }
            None => (None, rest),
        };
        let new = Macro {
            params,
            body: body.trim().to_string(),
        };
        if self.macros.get(&name).is_some_and(|old| *old != new) {
            self.report(
                Diagnostic::warning(Stage::Preprocess, format!("'{name}' macro redefined"))
                    .at(location.clone()),
            );
        }
        self.macros.insert(name, new);
    }

    /// Returns true if a file was spliced into the output
    fn include_directive(
        &mut self,
        args: &str,
        current: &str,
        location: &SourceLocation,
    ) -> Result<bool, (String, io::Error)> {
        let target = if args.starts_with('"') || args.starts_with('<') {
            args.to_string()
        } else {
            self.expand_line(args, location).trim().to_string()
        };
        let file = match (target.chars().next(), target.chars().last()) {
            (Some('"'), Some('"')) | (Some('<'), Some('>')) if target.len() >= 2 => {
                target[1..target.len() - 1].to_string()
            }
            _ => {
                self.report(
                    Diagnostic::error(Stage::Preprocess, "expected \"FILENAME\" or <FILENAME>")
                        .at(location.clone()),
                );
                return Ok(false);
            }
        };

        if self.depth >= MAX_INCLUDE_DEPTH {
            self.report(
                Diagnostic::fatal(Stage::Preprocess, "#include nested too deeply").at(location.clone()),
            );
            return Ok(false);
        }

        let loaded = match self.loader.as_deref_mut() {
            Some(loader) => loader.load(&file, current),
            None => Ok(None),
        };
        match loaded {
            Ok(Some(included)) => {
                if self.once.contains(&included.name) {
                    trace!("skipping '{}', already included with #pragma once", included.name);
                    return Ok(false);
                }
                debug!("including '{}' from '{current}'", included.name);
                self.depth += 1;
                let result = self.process_file(&included.text, &included.name);
                self.depth -= 1;
                result.map(|_| true)
            }
            Ok(None) => {
                self.report(
                    Diagnostic::fatal(Stage::Preprocess, format!("'{file}' file not found"))
                        .at(location.clone()),
                );
                Ok(false)
            }
            Err(err) => {
                self.report(
                    Diagnostic::fatal(Stage::Preprocess, format!("cannot read '{file}': {err}"))
                        .at(location.clone()),
                );
                Err((file, err))
            }
        }
    }

    fn pragma_directive(&mut self, args: &str, current: &str, location: &SourceLocation) {
        let pragma: String = args.chars().take_while(|c| is_ident_char(*c)).collect();
        match pragma.as_str() {
            "once" => {
                self.once.insert(current.to_string());
            }
            "message" => {
                let text = args[pragma.len()..]
                    .trim()
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .trim()
                    .trim_matches('"');
                self.report(Diagnostic::warning(Stage::Preprocess, text).at(location.clone()));
            }
            "pack_matrix" | "warning" | "def" | "region" | "endregion" | "dxc" => {}
            _ => self.report(
                Diagnostic::warning(Stage::Preprocess, "unknown pragma ignored").at(location.clone()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;

    struct Files(Vec<(&'static str, &'static str)>);

    impl IncludeLoader for Files {
        fn load(&mut self, name: &str, _includer: &str) -> io::Result<Option<IncludedFile>> {
            Ok(self.0.iter().find(|(n, _)| *n == name).map(|(n, text)| IncludedFile {
                name: n.to_string(),
                text: text.to_string(),
            }))
        }
    }

    struct Broken;

    impl IncludeLoader for Broken {
        fn load(&mut self, _name: &str, _includer: &str) -> io::Result<Option<IncludedFile>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn run(source: &str) -> PreprocessOutput {
        preprocess(source, "main.hlsl", &[], None).unwrap()
    }

    fn code_lines(text: &str) -> Vec<&str> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("#line"))
            .collect()
    }

    #[test]
    fn test_object_and_function_macros() {
        let out = run("#define SCALE 2\n#define MUL(a, b) ((a) * (b))\nx = MUL(y, SCALE);\n");
        assert_eq!(code_lines(&out.text), ["x = ((y) * (2));"]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_defines_argument_values() {
        let defines = vec![("A".to_string(), None), ("B".to_string(), Some("7".to_string()))];
        let out = preprocess("A B\n", "main.hlsl", &defines, None).unwrap();
        assert_eq!(code_lines(&out.text), ["1 7"]);
    }

    #[test]
    fn test_conditionals() {
        let source = "#define X 2\n#if X > 1 && defined(X)\nyes\n#elif 1\nno\n#else\nno\n#endif\n#ifndef Y\nalso\n#endif\n";
        let out = run(source);
        assert_eq!(code_lines(&out.text), ["yes", "also"]);
    }

    #[test]
    fn test_line_numbers_preserved() {
        let out = run("a\n#define Q \\\n  1\n// comment\nb\n");
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines[0], "#line 1 \"main.hlsl\"");
        assert_eq!(lines[1], "a");
        assert_eq!(lines[5], "b");
    }

    #[test]
    fn test_include_and_pragma_once() {
        let mut files = Files(vec![("common.hlsli", "#pragma once\nshared\n")]);
        let out = preprocess(
            "#include \"common.hlsli\"\n#include \"common.hlsli\"\nmain\n",
            "main.hlsl",
            &[],
            Some(&mut files),
        )
        .unwrap();
        assert_eq!(code_lines(&out.text), ["shared", "main"]);
        assert!(out.text.contains("#line 2 \"main.hlsl\""));
    }

    #[test]
    fn test_missing_include_is_recoverable() {
        let out = run("#include \"missing.h\"\nafter\n");
        assert_eq!(code_lines(&out.text), ["after"]);
        let d = out.diagnostics.iter().next().unwrap();
        assert_eq!(d.severity, Severity::Fatal);
        assert_eq!(
            d.to_string(),
            "main.hlsl:1:1: fatal error: 'missing.h' file not found [preprocess]"
        );
    }

    #[test]
    fn test_include_io_error_aborts() {
        let err = preprocess("#include \"x.h\"\n", "main.hlsl", &[], Some(&mut Broken)).unwrap_err();
        assert_eq!(err.name, "x.h");
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn test_recursive_include_depth_limit() {
        let mut files = Files(vec![("self.h", "#include \"self.h\"\n")]);
        let out = preprocess("#include \"self.h\"\n", "main.hlsl", &[], Some(&mut files)).unwrap();
        assert_eq!(out.diagnostics.error_count(), 1);
        assert!(out.diagnostics.render().contains("nested too deeply"));
    }

    #[test]
    fn test_error_and_pragmas() {
        let out = run("#pragma message(\"hello\")\n#pragma bogus\n#error stop here\n");
        let rendered = out.diagnostics.render();
        assert!(rendered.contains("warning: hello [preprocess]"));
        assert!(rendered.contains("warning: unknown pragma ignored"));
        assert!(rendered.contains("error: stop here"));
        assert_eq!(out.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_unterminated_conditional() {
        let out = run("#if 1\nx\n");
        assert!(out.diagnostics.has_errors());
    }

    #[test]
    fn test_stringize_and_paste() {
        let out = run("#define STR(x) #x\n#define CAT(a, b) a ## b\nSTR(hi) CAT(tex, 0)\n");
        assert_eq!(code_lines(&out.text), ["\"hi\" tex0"]);
    }

    #[test]
    fn test_self_referential_macro_stops() {
        let out = run("#define A A + 1\nA\n");
        assert_eq!(code_lines(&out.text), ["A + 1"]);
    }
}
