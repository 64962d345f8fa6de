//! Code generation to a register-style program listing

use crate::module::{Module, Opcode};
use log::debug;
use std::collections::HashMap;
use std::fmt::Write;

/// Generated code for one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineFunction {
    /// Function name
    pub name: String,
    /// Number of temporary registers allocated
    pub temps: u32,
    /// Instructions in program order
    pub instructions: Vec<String>,
}

/// Generated code for a whole module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Target profile string
    pub profile: String,
    /// Entry point, empty for libraries
    pub entry_point: String,
    /// One entry per function
    pub functions: Vec<MachineFunction>,
}

impl Listing {
    /// Total instruction count
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instructions.len()).sum()
    }

    /// Renders the listing as text
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; profile {}", self.profile);
        if !self.entry_point.is_empty() {
            let _ = writeln!(out, "; entry {}", self.entry_point);
        }
        for f in &self.functions {
            let _ = writeln!(out, "\n{}:", f.name);
            let _ = writeln!(out, "  dcl_temps {}", f.temps);
            for (index, inst) in f.instructions.iter().enumerate() {
                let _ = writeln!(out, "  {index:>4}: {inst}");
            }
        }
        out
    }
}

/// Lowers every function to listing instructions.
///
/// Locals are assigned temporaries `r0`, `r1`, ... in declaration order and
/// blocks are closed with the matching `endif` or `endloop`.
pub fn generate(module: &Module) -> Listing {
    let mut functions = Vec::with_capacity(module.functions.len());
    for f in &module.functions {
        let mut temps: HashMap<&str, u32> = HashMap::new();
        let mut blocks: Vec<Opcode> = Vec::new();
        let mut instructions = Vec::with_capacity(f.body.len());

        for inst in &f.body {
            let line = match inst.opcode {
                Opcode::Let => {
                    let name = inst.result.as_deref().unwrap_or("_");
                    let next = temps.len() as u32;
                    let reg = *temps.entry(name).or_insert(next);
                    if inst.operands.is_empty() {
                        format!("dcl_local r{reg} ; {name}")
                    } else {
                        format!("mov r{reg}, {} ; {name}", inst.operands)
                    }
                }
                Opcode::Store => format!("store {}", inst.operands),
                Opcode::Eval => format!("call {}", inst.operands),
                Opcode::Ret if inst.operands.is_empty() => "ret".to_string(),
                Opcode::Ret => format!("ret {}", inst.operands),
                Opcode::If => {
                    blocks.push(Opcode::If);
                    format!("if_nz {}", inst.operands)
                }
                Opcode::Loop => {
                    blocks.push(Opcode::Loop);
                    format!("loop ; {}", inst.operands)
                }
                Opcode::Else => "else".to_string(),
                Opcode::End => match blocks.pop() {
                    Some(Opcode::Loop) => "endloop".to_string(),
                    _ => "endif".to_string(),
                },
                Opcode::Break => "break".to_string(),
                Opcode::Continue => "continue".to_string(),
                Opcode::Discard => "discard".to_string(),
            };
            instructions.push(line);
        }

        functions.push(MachineFunction {
            name: f.name.clone(),
            temps: temps.len() as u32,
            instructions,
        });
    }

    let listing = Listing {
        profile: module.target.to_string(),
        entry_point: module.entry_point.clone(),
        functions,
    };
    debug!(
        "generated {} instructions for {}",
        listing.instruction_count(),
        listing.profile
    );
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_blocks_and_temps() {
        let m = Module::parse(
            "target cs_6_0\nentry @main\nnumthreads 1 1 1\ndefine void @main() {\n  %i = let int 0\n  loop while (i < 4)\n    if i == 2\n      break\n    end\n    store i += 1\n  end\n  ret\n}\n",
        )
        .unwrap();
        let listing = generate(&m);
        let f = &listing.functions[0];
        assert_eq!(f.temps, 1);
        assert_eq!(
            f.instructions,
            [
                "mov r0, 0 ; i",
                "loop ; while (i < 4)",
                "if_nz i == 2",
                "break",
                "endif",
                "store i += 1",
                "endloop",
                "ret"
            ]
        );
        assert!(listing.render().contains("; profile cs_6_0"));
    }
}
