//! Intermediate shader module
//!
//! A module is what the front end produces and every later stage consumes.
//! It exists in two interchangeable forms: a line-oriented text form (see
//! [`text`]) and a compact binary form (see [`crate::bitcode`]).

pub mod text;

use crate::target::ShaderTarget;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fmt;

/// Register class a resource binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Constant buffer view (`b` registers)
    Cbv,
    /// Shader resource view (`t` registers)
    Srv,
    /// Unordered access view (`u` registers)
    Uav,
    /// Sampler (`s` registers)
    Sampler,
}

impl ResourceClass {
    /// Every class, in register letter order b, t, u, s
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::Cbv,
        ResourceClass::Srv,
        ResourceClass::Uav,
        ResourceClass::Sampler,
    ];

    /// Name used in module text
    pub fn name(&self) -> &'static str {
        match self {
            ResourceClass::Cbv => "cbv",
            ResourceClass::Srv => "srv",
            ResourceClass::Uav => "uav",
            ResourceClass::Sampler => "sampler",
        }
    }

    /// Looks a class up by its module text name
    pub fn from_name(name: &str) -> Option<ResourceClass> {
        ResourceClass::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Register letter used in `register(...)` annotations
    pub fn register_letter(&self) -> char {
        match self {
            ResourceClass::Cbv => 'b',
            ResourceClass::Srv => 't',
            ResourceClass::Uav => 'u',
            ResourceClass::Sampler => 's',
        }
    }

    /// Looks a class up by its register letter
    pub fn from_register_letter(letter: char) -> Option<ResourceClass> {
        let letter = letter.to_ascii_lowercase();
        ResourceClass::ALL
            .into_iter()
            .find(|c| c.register_letter() == letter)
    }

    /// Stable numeric code used by the binary encodings
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`ResourceClass::code`]
    pub fn from_code(code: u8) -> Option<ResourceClass> {
        ResourceClass::ALL.get(code as usize).copied()
    }
}

/// A bound resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Register class
    pub class: ResourceClass,
    /// Declared type, e.g. `Texture2D<float4>` or `cbuffer`
    pub type_name: String,
    /// Variable or buffer name
    pub name: String,
    /// Register space
    pub space: u32,
    /// First register
    pub slot: u32,
    /// Number of registers, 1 for non-arrays
    pub count: u32,
    /// Resource kind code (constant buffer, texture, structured buffer, ...)
    pub kind: u32,
    /// Dimension code, 0 when not applicable
    pub dimension: u32,
    /// Return type code, 0 when not applicable
    pub return_type: u32,
    /// Member names for constant buffers
    pub fields: Vec<String>,
}

impl Resource {
    /// Returns true if `other` shares a register with this resource
    pub fn overlaps(&self, other: &Resource) -> bool {
        self.class == other.class
            && self.space == other.space
            && self.slot < other.slot.saturating_add(other.count.max(1))
            && other.slot < self.slot.saturating_add(self.count.max(1))
    }

    /// Register annotation such as `t3` or `b0, space1`
    pub fn register(&self) -> String {
        let letter = self.class.register_letter();
        if self.space == 0 {
            format!("{letter}{}", self.slot)
        } else {
            format!("{letter}{}, space{}", self.slot, self.space)
        }
    }
}

/// One element of an input or output signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureElement {
    /// Semantic name without its trailing index
    pub semantic_name: String,
    /// Semantic index
    pub semantic_index: u32,
    /// Register the element is assigned to
    pub register: u32,
    /// System value code, 0 for user semantics
    pub system_value: u32,
    /// Component type code (1 uint, 2 int, 3 float)
    pub component_type: u32,
    /// Component mask
    pub mask: u8,
}

/// Debug location of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugLoc {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

/// Instruction opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Declare a local, optionally initialized
    Let,
    /// Assignment to an existing location
    Store,
    /// Expression evaluated for its side effects
    Eval,
    /// Return from the function
    Ret,
    /// Open a conditional block
    If,
    /// Switch to the else arm of the innermost `if`
    Else,
    /// Close the innermost `if` or `loop`
    End,
    /// Open a loop block
    Loop,
    /// Leave the innermost loop
    Break,
    /// Next iteration of the innermost loop
    Continue,
    /// Discard the current pixel
    Discard,
}

impl Opcode {
    /// Every opcode
    pub const ALL: [Opcode; 11] = [
        Opcode::Let,
        Opcode::Store,
        Opcode::Eval,
        Opcode::Ret,
        Opcode::If,
        Opcode::Else,
        Opcode::End,
        Opcode::Loop,
        Opcode::Break,
        Opcode::Continue,
        Opcode::Discard,
    ];

    /// Mnemonic used in module text
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Let => "let",
            Opcode::Store => "store",
            Opcode::Eval => "eval",
            Opcode::Ret => "ret",
            Opcode::If => "if",
            Opcode::Else => "else",
            Opcode::End => "end",
            Opcode::Loop => "loop",
            Opcode::Break => "break",
            Opcode::Continue => "continue",
            Opcode::Discard => "discard",
        }
    }

    /// Looks an opcode up by its mnemonic
    pub fn from_name(name: &str) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Stable numeric code used by bitcode
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`Opcode::code`]
    pub fn from_code(code: u8) -> Option<Opcode> {
        Opcode::ALL.get(code as usize).copied()
    }

    /// Returns true if control never falls through to the next instruction
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Ret | Opcode::Break | Opcode::Continue | Opcode::Discard
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Named result, only for `let`
    pub result: Option<String>,
    /// Operation
    pub opcode: Opcode,
    /// Declared type, only for `let`
    pub ty: Option<String>,
    /// Operand expression text
    pub operands: String,
    /// Source location
    pub debug_loc: Option<DebugLoc>,
}

impl Instruction {
    /// Creates an instruction with no result, type or location
    pub fn new(opcode: Opcode, operands: impl Into<String>) -> Self {
        Instruction {
            result: None,
            opcode,
            ty: None,
            operands: operands.into(),
            debug_loc: None,
        }
    }

    /// Creates a `let` instruction
    pub fn let_(name: impl Into<String>, ty: impl Into<String>, init: impl Into<String>) -> Self {
        Instruction {
            result: Some(name.into()),
            opcode: Opcode::Let,
            ty: Some(ty.into()),
            operands: init.into(),
            debug_loc: None,
        }
    }

    /// Attaches a debug location
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.debug_loc = Some(DebugLoc { line, column });
        self
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Type with any `in`/`out`/`inout` modifier
    pub ty: String,
    /// Parameter name
    pub name: String,
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Return type, `void` for none
    pub return_type: String,
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Instructions in program order
    pub body: Vec<Instruction>,
}

/// A complete intermediate module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Name of the main source file
    pub source_name: Option<String>,
    /// Target profile
    pub target: ShaderTarget,
    /// Entry point name, empty for libraries
    pub entry_point: String,
    /// Thread group size for compute-like stages
    pub thread_group: Option<[u32; 3]>,
    /// Root signature text from the `RootSignature` attribute
    pub root_signature: Option<String>,
    /// Bound resources
    pub resources: Vec<Resource>,
    /// Input signature
    pub inputs: Vec<SignatureElement>,
    /// Output signature
    pub outputs: Vec<SignatureElement>,
    /// Function definitions
    pub functions: Vec<Function>,
}

impl Module {
    /// Creates an empty module for `target`
    pub fn new(target: ShaderTarget, entry_point: impl Into<String>) -> Self {
        Module {
            source_name: None,
            target,
            entry_point: entry_point.into(),
            thread_group: None,
            root_signature: None,
            resources: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Looks a function up by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The entry function, if defined
    pub fn entry_function(&self) -> Option<&Function> {
        self.function(&self.entry_point)
    }

    /// Total instructions across all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.body.len()).sum()
    }

    /// Returns true if any instruction carries a debug location
    pub fn has_debug_info(&self) -> bool {
        self.functions
            .iter()
            .flat_map(|f| &f.body)
            .any(|i| i.debug_loc.is_some())
    }

    /// Parses module text
    pub fn parse(text: &str) -> Result<Module> {
        text::parse(text)
    }

    /// Prints module text
    pub fn to_text(&self) -> String {
        text::print(self)
    }

    /// Checks the module's structural rules.
    ///
    /// Non-library modules need a defined entry point; function names are
    /// unique; resource registers do not overlap; every block is closed and
    /// `break`/`continue` only appear inside loops.
    pub fn verify(&self) -> Result<()> {
        if !self.target.is_library() {
            if self.entry_point.is_empty() {
                return Err(Error::Verify("module has no entry point".to_string()));
            }
            if self.entry_function().is_none() {
                return Err(Error::Verify(format!(
                    "entry point '@{}' is not defined",
                    self.entry_point
                )));
            }
        }

        let mut names = HashSet::new();
        for f in &self.functions {
            if !names.insert(f.name.as_str()) {
                return Err(Error::Verify(format!("function '@{}' is defined twice", f.name)));
            }
        }

        for (i, a) in self.resources.iter().enumerate() {
            for b in &self.resources[i + 1..] {
                if a.overlaps(b) {
                    return Err(Error::Verify(format!(
                        "resources '{}' and '{}' overlap at register {}",
                        a.name,
                        b.name,
                        b.register()
                    )));
                }
            }
        }

        self.functions.iter().try_for_each(verify_function)
    }
}

fn verify_function(f: &Function) -> Result<()> {
    let fail = |message: String| Err(Error::Verify(format!("in '@{}': {message}", f.name)));
    // (opcode, else seen)
    let mut blocks: Vec<(Opcode, bool)> = Vec::new();

    for inst in &f.body {
        match (inst.opcode, &inst.result) {
            (Opcode::Let, None) => return fail("'let' without a result name".to_string()),
            (Opcode::Let, Some(_)) if inst.ty.is_none() => {
                return fail("'let' without a type".to_string());
            }
            (op, Some(name)) if op != Opcode::Let => {
                return fail(format!("'{op}' cannot define '%{name}'"));
            }
            _ => {}
        }

        match inst.opcode {
            Opcode::If | Opcode::Loop => blocks.push((inst.opcode, false)),
            Opcode::Else => match blocks.last_mut() {
                Some((Opcode::If, seen_else)) if !*seen_else => *seen_else = true,
                _ => return fail("'else' outside of an 'if' block".to_string()),
            },
            Opcode::End => {
                if blocks.pop().is_none() {
                    return fail("'end' without an open block".to_string());
                }
            }
            Opcode::Break | Opcode::Continue => {
                if !blocks.iter().any(|(op, _)| *op == Opcode::Loop) {
                    return fail(format!("'{}' outside of a loop", inst.opcode));
                }
            }
            _ => {}
        }
    }

    if !blocks.is_empty() {
        return fail("unterminated block".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with(body: Vec<Instruction>) -> Module {
        let mut m = Module::new(ShaderTarget::PS_6_0, "main");
        m.functions.push(Function {
            name: "main".to_string(),
            return_type: "void".to_string(),
            params: Vec::new(),
            body,
        });
        m
    }

    #[test]
    fn test_verify_ok() {
        let m = module_with(vec![
            Instruction::new(Opcode::Loop, "while (true)"),
            Instruction::new(Opcode::If, "x"),
            Instruction::new(Opcode::Break, ""),
            Instruction::new(Opcode::Else, ""),
            Instruction::new(Opcode::Continue, ""),
            Instruction::new(Opcode::End, ""),
            Instruction::new(Opcode::End, ""),
            Instruction::new(Opcode::Ret, ""),
        ]);
        m.verify().unwrap();
    }

    #[test]
    fn test_verify_rejects_unbalanced_blocks() {
        let m = module_with(vec![Instruction::new(Opcode::If, "x")]);
        assert!(m.verify().is_err());
        let m = module_with(vec![Instruction::new(Opcode::Break, "")]);
        assert!(m.verify().is_err());
        let m = module_with(vec![Instruction::new(Opcode::Else, "")]);
        assert!(m.verify().is_err());
    }

    #[test]
    fn test_verify_missing_entry() {
        let mut m = module_with(Vec::new());
        m.entry_point = "other".to_string();
        assert!(m.verify().is_err());
        m.target = ShaderTarget::LIB_6_3;
        m.verify().unwrap();
    }

    #[test]
    fn test_resource_overlap() {
        let tex = |name: &str, slot, count| Resource {
            class: ResourceClass::Srv,
            type_name: "Texture2D".to_string(),
            name: name.to_string(),
            space: 0,
            slot,
            count,
            kind: 2,
            dimension: 4,
            return_type: 5,
            fields: Vec::new(),
        };
        assert!(tex("a", 0, 4).overlaps(&tex("b", 3, 1)));
        assert!(!tex("a", 0, 3).overlaps(&tex("b", 3, 1)));
        let mut m = module_with(Vec::new());
        m.resources = vec![tex("a", 0, 2), tex("b", 1, 1)];
        assert!(m.verify().is_err());
    }
}
