//! Module transformations run by the optimizer passes
//!
//! Each transformation returns true if it changed the module.

use crate::module::{Function, Instruction, Module, Opcode};
use log::trace;
use std::collections::{HashMap, HashSet, VecDeque};

/// Intrinsics and methods that write memory or synchronize
const SIDE_EFFECT_CALLS: &[&str] = &[
    "InterlockedAdd",
    "InterlockedAnd",
    "InterlockedCompareExchange",
    "InterlockedCompareStore",
    "InterlockedExchange",
    "InterlockedMax",
    "InterlockedMin",
    "InterlockedOr",
    "InterlockedXor",
    "Append",
    "Consume",
    "IncrementCounter",
    "DecrementCounter",
    "Store",
    "Store2",
    "Store3",
    "Store4",
    "GroupMemoryBarrier",
    "GroupMemoryBarrierWithGroupSync",
    "DeviceMemoryBarrier",
    "DeviceMemoryBarrierWithGroupSync",
    "AllMemoryBarrier",
    "AllMemoryBarrierWithGroupSync",
    "SetMeshOutputCounts",
    "DispatchMesh",
    "clip",
    "abort",
    "printf",
    "errorf",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Scans identifiers in expression text.
///
/// Yields `(identifier, follows_dot, followed_by_paren)` and skips string
/// and numeric literals.
fn scan(text: &str) -> Vec<(&str, bool, bool)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += if bytes[i] == b'\\' { 2 } else { 1 };
            }
            i += 1;
        } else if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let follows_dot = text[..start].trim_end().ends_with('.');
            let followed_by_paren = text[i..].trim_start().starts_with('(');
            out.push((&text[start..i], follows_dot, followed_by_paren));
        } else {
            i += 1;
        }
    }
    out
}

/// Identifiers referenced by expression text, excluding member names
pub fn identifiers(text: &str) -> Vec<&str> {
    scan(text)
        .into_iter()
        .filter(|(_, follows_dot, _)| !follows_dot)
        .map(|(name, _, _)| name)
        .collect()
}

/// Names of functions and methods called by expression text
pub fn calls(text: &str) -> Vec<&str> {
    scan(text)
        .into_iter()
        .filter(|(_, _, paren)| *paren)
        .map(|(name, _, _)| name)
        .collect()
}

fn writes_memory(text: &str) -> bool {
    if text.contains("++") || text.contains("--") {
        return true;
    }
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, b)| {
        *b == b'='
            && bytes.get(i + 1) != Some(&b'=')
            && !matches!(i.checked_sub(1).map(|p| bytes[p]), Some(b'=' | b'!' | b'<' | b'>'))
    })
}

/// Returns true if evaluating `text` may have an observable effect
pub fn has_side_effects(text: &str, user_functions: &HashSet<&str>) -> bool {
    writes_memory(text)
        || calls(text)
            .iter()
            .any(|c| user_functions.contains(c) || SIDE_EFFECT_CALLS.contains(c))
}

fn simplify_function(f: &mut Function) -> bool {
    let before = f.body.len();
    let mut kept = Vec::with_capacity(f.body.len());
    let mut depth = 0usize;
    let mut dead_at: Option<usize> = None;

    for inst in f.body.drain(..) {
        if let Some(dead_depth) = dead_at {
            match inst.opcode {
                Opcode::If | Opcode::Loop => depth += 1,
                Opcode::Else if depth == dead_depth => {
                    dead_at = None;
                    kept.push(inst);
                }
                Opcode::End if depth == dead_depth => {
                    dead_at = None;
                    depth = depth.saturating_sub(1);
                    kept.push(inst);
                }
                Opcode::End => depth = depth.saturating_sub(1),
                _ => {}
            }
            continue;
        }
        match inst.opcode {
            Opcode::If | Opcode::Loop => depth += 1,
            Opcode::End => depth = depth.saturating_sub(1),
            op if op.is_terminator() => dead_at = Some(depth),
            _ => {}
        }
        kept.push(inst);
    }

    // Drop `if c / end` and `if c / else / end` with nothing inside
    let mut out: Vec<Instruction> = Vec::with_capacity(kept.len());
    for inst in kept {
        if inst.opcode == Opcode::End {
            let n = out.len();
            let empty_if = n >= 1
                && out[n - 1].opcode == Opcode::If
                && !writes_memory(&out[n - 1].operands);
            let empty_if_else = n >= 2
                && out[n - 1].opcode == Opcode::Else
                && out[n - 2].opcode == Opcode::If
                && !writes_memory(&out[n - 2].operands);
            if empty_if {
                out.truncate(n - 1);
                continue;
            }
            if empty_if_else {
                out.truncate(n - 2);
                continue;
            }
        }
        out.push(inst);
    }

    f.body = out;
    f.body.len() != before
}

/// Removes instructions after a terminator and empty conditionals
pub fn simplify_cfg(module: &mut Module) -> bool {
    let mut changed = false;
    for f in &mut module.functions {
        changed |= simplify_function(f);
    }
    trace!("simplifycfg changed={changed}");
    changed
}

/// Removes side-effect-free `let` and `eval` instructions whose value is unused
pub fn eliminate_dead_code(module: &mut Module) -> bool {
    let user_functions: HashSet<String> = module.functions.iter().map(|f| f.name.clone()).collect();
    let user_functions: HashSet<&str> = user_functions.iter().map(String::as_str).collect();
    let mut changed = false;

    for f in &mut module.functions {
        loop {
            let mut uses: HashMap<String, usize> = HashMap::new();
            for inst in &f.body {
                for ident in identifiers(&inst.operands) {
                    *uses.entry(ident.to_string()).or_default() += 1;
                }
            }
            let before = f.body.len();
            f.body.retain(|inst| match inst.opcode {
                Opcode::Let => {
                    let used = inst
                        .result
                        .as_ref()
                        .is_some_and(|name| uses.contains_key(name.as_str()));
                    used || has_side_effects(&inst.operands, &user_functions)
                }
                Opcode::Eval => has_side_effects(&inst.operands, &user_functions),
                _ => true,
            });
            if f.body.len() == before {
                break;
            }
            changed = true;
        }
    }
    trace!("dce changed={changed}");
    changed
}

/// Removes functions unreachable from the entry point.
///
/// Libraries export every function, so nothing is removed from them.
pub fn eliminate_dead_globals(module: &mut Module) -> bool {
    if module.target.is_library() {
        return false;
    }
    let names: HashSet<String> = module.functions.iter().map(|f| f.name.clone()).collect();
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([module.entry_point.clone()]);

    while let Some(name) = queue.pop_front() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        let Some(f) = module.function(&name) else { continue };
        for inst in &f.body {
            for callee in calls(&inst.operands) {
                if names.contains(callee) && !reachable.contains(callee) {
                    queue.push_back(callee.to_string());
                }
            }
        }
    }

    let before = module.functions.len();
    module.functions.retain(|f| reachable.contains(&f.name));
    let changed = module.functions.len() != before;
    trace!("globaldce changed={changed}");
    changed
}

/// Removes resources no instruction refers to
pub fn remove_unused_resources(module: &mut Module) -> bool {
    let used: HashSet<String> = module
        .functions
        .iter()
        .flat_map(|f| &f.body)
        .flat_map(|inst| identifiers(&inst.operands))
        .map(str::to_string)
        .collect();
    let before = module.resources.len();
    module.resources.retain(|r| {
        used.contains(&r.name) || r.fields.iter().any(|field| used.contains(field))
    });
    let changed = module.resources.len() != before;
    trace!("dxil-remove-unused-resources changed={changed}");
    changed
}

/// Removes every debug location
pub fn strip_debug(module: &mut Module) -> bool {
    let mut changed = false;
    for inst in module.functions.iter_mut().flat_map(|f| &mut f.body) {
        changed |= inst.debug_loc.take().is_some();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body_text(m: &Module, name: &str) -> Vec<String> {
        m.function(name)
            .map(|f| {
                f.body
                    .iter()
                    .map(|i| format!("{} {}", i.opcode, i.operands).trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_identifiers_and_calls() {
        assert_eq!(identifiers("tex.Sample(s, uv.xy) * 2.0f"), ["tex", "s", "uv"]);
        assert_eq!(calls("helper(a) + tex.Sample(s, uv)"), ["helper", "Sample"]);
        assert_eq!(identifiers("\"str x\" + y"), ["y"]);
    }

    #[test]
    fn test_side_effects() {
        let none = HashSet::new();
        assert!(has_side_effects("x += 1", &none));
        assert!(has_side_effects("buf.Append(v)", &none));
        assert!(!has_side_effects("a == b && c <= d", &none));
        let user = HashSet::from(["helper"]);
        assert!(has_side_effects("helper(1)", &user));
    }

    #[test]
    fn test_simplify_cfg_drops_unreachable() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\ndefine void @main() {\n  if a\n    ret\n    store x = 1\n  else\n    discard\n    if b\n    end\n  end\n  if c\n  end\n  ret\n  eval f()\n}\n",
        )
        .unwrap();
        assert!(simplify_cfg(&mut m));
        assert_eq!(
            body_text(&m, "main"),
            ["if a", "ret", "else", "discard", "end", "ret"]
        );
        m.verify().unwrap();
    }

    #[test]
    fn test_simplify_cfg_drops_empty_conditionals() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\ndefine void @main() {\n  if a\n  else\n  end\n  if b\n    if c\n    end\n  end\n  if x += 1\n  end\n  ret\n}\n",
        )
        .unwrap();
        assert!(simplify_cfg(&mut m));
        assert_eq!(body_text(&m, "main"), ["if x += 1", "end", "ret"]);
    }

    #[test]
    fn test_dce_removes_chains() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\ndefine float @main() {\n  %a = let float 1.0\n  %b = let float a * 2\n  %c = let float 3.0\n  %d = let float helper()\n  eval c + 1\n  ret c\n}\ndefine float @helper() {\n  ret 1\n}\n",
        )
        .unwrap();
        assert!(eliminate_dead_code(&mut m));
        assert_eq!(
            body_text(&m, "main"),
            ["let 3.0", "let helper()", "ret c"]
        );
    }

    #[test]
    fn test_globaldce_keeps_reachable() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\ndefine void @main() {\n  eval a()\n  ret\n}\ndefine void @a() {\n  eval b()\n}\ndefine void @b() {\n}\ndefine void @unused() {\n}\n",
        )
        .unwrap();
        assert!(eliminate_dead_globals(&mut m));
        let names: Vec<&str> = m.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["main", "a", "b"]);
    }

    #[test]
    fn test_remove_unused_resources() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\n\
             resource cbv cbuffer @P space=0 slot=0 count=1 kind=0 dim=0 ret=0 fields=scale\n\
             resource srv Texture2D<float4> @used space=0 slot=0 count=1 kind=2 dim=4 ret=5\n\
             resource srv Texture2D<float4> @unused space=0 slot=1 count=1 kind=2 dim=4 ret=5\n\
             define float4 @main() {\n  ret used.Load(0) * scale\n}\n",
        )
        .unwrap();
        assert!(remove_unused_resources(&mut m));
        let names: Vec<&str> = m.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["P", "used"]);
    }

    #[test]
    fn test_strip_debug() {
        let mut m = Module::parse(
            "target ps_6_0\nentry @main\ndefine void @main() {\n  ret !dbg 1:1\n}\n",
        )
        .unwrap();
        assert!(m.has_debug_info());
        assert!(strip_debug(&mut m));
        assert!(!m.has_debug_info());
        assert!(!strip_debug(&mut m));
    }
}
