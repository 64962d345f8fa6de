//! Root signature part (`RTS0`)

use dxcompiler::codec::{Reader, Writer};

const ROOT_SIGNATURE_VERSION: u32 = 1;

/// One top-level clause of a root signature, e.g. `CBV(b0)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootParameter {
    /// Clause name: `RootFlags`, `CBV`, `DescriptorTable`, ...
    pub name: String,
    /// Text between the clause's parentheses
    pub arguments: String,
}

/// Root signature reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSignatureDesc {
    /// Root signature text as written in the `RootSignature` attribute
    pub source: String,
    /// Top-level clauses in declaration order
    pub parameters: Vec<RootParameter>,
}

impl RootSignatureDesc {
    /// Splits root signature text into its top-level clauses
    pub fn parse(source: &str) -> Self {
        let mut parameters = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        let mut push = |clause: &str| {
            let clause = clause.trim();
            if clause.is_empty() {
                return;
            }
            let (name, arguments) = match clause.split_once('(') {
                Some((name, rest)) => (name.trim(), rest.strip_suffix(')').unwrap_or(rest).trim()),
                None => (clause, ""),
            };
            parameters.push(RootParameter {
                name: name.to_string(),
                arguments: arguments.to_string(),
            });
        };
        for (i, c) in source.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    push(&source[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        push(&source[start..]);
        RootSignatureDesc {
            source: source.to_string(),
            parameters,
        }
    }

    /// Looks a clause up by name
    pub fn parameter(&self, name: &str) -> Option<&RootParameter> {
        self.parameters.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Serializes a root signature part payload
pub(crate) fn encode_root_signature(source: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(ROOT_SIGNATURE_VERSION);
    w.str(source);
    w.into_bytes()
}

/// Parses a root signature part payload
pub(crate) fn decode_root_signature(bytes: &[u8]) -> dxcompiler::Result<RootSignatureDesc> {
    let mut r = Reader::new(bytes);
    let version = r.u32()?;
    if version != ROOT_SIGNATURE_VERSION {
        return Err(r.error(format!("unsupported root signature version {version}")));
    }
    let source = r.str()?;
    if !r.is_at_end() {
        return Err(r.error("trailing bytes after root signature"));
    }
    Ok(RootSignatureDesc::parse(&source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clauses() {
        let desc = RootSignatureDesc::parse(
            "RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT), CBV(b0), DescriptorTable(SRV(t0, numDescriptors = 2), UAV(u0))",
        );
        let names: Vec<_> = desc.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["RootFlags", "CBV", "DescriptorTable"]);
        assert_eq!(
            desc.parameter("descriptortable").unwrap().arguments,
            "SRV(t0, numDescriptors = 2), UAV(u0)"
        );
    }

    #[test]
    fn test_root_signature_payload() {
        let desc = decode_root_signature(&encode_root_signature("CBV(b0)")).unwrap();
        assert_eq!(desc.source, "CBV(b0)");
        assert_eq!(desc.parameters.len(), 1);
        assert!(decode_root_signature(&[2, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
