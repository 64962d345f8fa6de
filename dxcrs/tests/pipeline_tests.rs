//! End-to-end runs through the services

use dxcrs::{
    Assembler, Blob, CodePage, Compiler, Container, ContainerBuilder, HResult, Library,
    OperationResult, Optimizer, PartKind, Validator, ValidatorFlags, compile, disassemble,
    ShaderTarget,
};
use pretty_assertions::assert_eq;

const VALID_IR: &str = "\
source \"tint.hlsl\"
target ps_6_0
entry @main
input COLOR 0 reg=0 sv=0 comp=3 mask=15
output SV_Target 0 reg=0 sv=64 comp=3 mask=15

define float4 @scale(float4 c) {
  %r = let float4 c * 2
  ret r
}

define float4 @main(float4 color) {
  %lit = let float4 1
  if 0
  %dead = let float4 3
  end
  ret color !dbg 12:5
}
";

fn assemble(ir: &str) -> OperationResult {
    Assembler::new().assemble_to_container(&Blob::from(ir))
}

fn parts(container: &Container) -> Vec<(PartKind, Vec<u8>)> {
    container
        .parts()
        .iter()
        .map(|p| (p.kind, p.content.to_vec()))
        .collect()
}

#[test]
fn sub_blob_matches_parent_range() {
    let library = Library::new();
    let parent = library.create_blob_with_encoding(b"cbuffer Globals { float4 tint; };", Some(CodePage::UTF8));
    for (offset, length) in [(0, 0), (0, 7), (8, 7), (33, 0), (20, 13)] {
        let child = library.create_blob_from_blob(&parent, offset, length).unwrap();
        assert_eq!(child.as_bytes(), &parent.as_bytes()[offset..offset + length]);
    }
    for (offset, length) in [(0, 34), (34, 0), (30, 10), (usize::MAX, 2)] {
        let err = library.create_blob_from_blob(&parent, offset, length).unwrap_err();
        assert_eq!(err.hresult(), HResult::E_BOUNDS);
    }
}

#[test]
fn status_and_result_agree() {
    let results = [
        assemble(VALID_IR),
        assemble("define oops"),
        Validator::new().validate(&Blob::from("DXBC"), ValidatorFlags::DEFAULT),
        Optimizer::new().run(&Blob::from(VALID_IR), &["-dce"]).result,
        Optimizer::new().run(&Blob::from(VALID_IR), &["-nonesuch"]).result,
        Compiler::new().compile(
            &dxcrs::EncodedBlob::from_text("float4 main() : SV_Target { return 0; }"),
            None,
            "main",
            "ps_6_0",
            &["-O0"],
            &[],
            None,
        ),
    ];
    for result in &results {
        assert_eq!(result.status() == HResult::S_OK, result.result().is_some());
    }
    assert!(results.iter().any(|r| r.is_success()));
    assert!(results.iter().any(|r| !r.is_success()));
}

#[test]
fn assembled_container_loads() {
    let result = assemble(VALID_IR);
    assert!(result.is_success(), "{}", result.diagnostics_text());
    let container = Container::load(result.result().unwrap()).unwrap();
    assert!(container.part_count() >= 1);
    assert!(container.find_part(PartKind::DXIL).is_some());
    assert!(container.find_part(PartKind::ILDB).is_some());
}

#[test]
fn loading_twice_gives_same_parts() {
    let blob = assemble(VALID_IR).result().cloned().unwrap();
    let first = Container::load(&blob).unwrap();
    let second = Container::load(&Blob::from_vec(blob.to_vec())).unwrap();
    assert_eq!(parts(&first), parts(&second));
}

#[test]
fn optimizer_runs_compose() {
    let optimizer = Optimizer::new();
    let input = Blob::from(VALID_IR);
    let both = optimizer.run(&input, &["-simplifycfg", "-dce"]);
    let first = optimizer.run(&input, &["-simplifycfg"]);
    let second = optimizer.run(first.result.result().unwrap(), &["-dce"]);
    assert_eq!(
        both.result.result().unwrap().to_string_lossy(),
        second.result.result().unwrap().to_string_lossy()
    );
    assert!(!both.result.result().unwrap().to_string_lossy().contains("%dead"));
}

#[test]
fn find_first_part_kind_returns_first_index() {
    let blob = ContainerBuilder::new()
        .with_part(PartKind(1), b"a".to_vec())
        .with_part(PartKind(2), b"b".to_vec())
        .with_part(PartKind(1), b"c".to_vec())
        .build()
        .unwrap();
    let container = Container::load(&blob).unwrap();
    assert_eq!(container.find_first_part_kind(PartKind(1)), Some(0));
    assert_eq!(container.find_first_part_kind(PartKind(2)), Some(1));
}

#[test]
fn compile_minimal_pixel_shader() {
    let result = Compiler::new().compile(
        &dxcrs::EncodedBlob::from_text("float4 main() : SV_Target { return 0; }"),
        None,
        "main",
        "ps_6_0",
        &[] as &[&str],
        &[],
        None,
    );
    assert_eq!(result.status(), HResult::S_OK, "{}", result.diagnostics_text());
    let blob = result.result().unwrap();
    assert!(!blob.is_empty());
    let container = Container::load(blob).unwrap();
    assert!(container.find_first_part_kind(PartKind::DXIL).is_some());
}

#[test]
fn missing_include_without_resolver() {
    let result = Compiler::new().compile(
        &dxcrs::EncodedBlob::from_text(
            "#include \"missing.h\"\nfloat4 main() : SV_Target { return 0; }",
        ),
        None,
        "main",
        "ps_6_0",
        &[] as &[&str],
        &[],
        None,
    );
    assert_ne!(result.status(), HResult::S_OK);
    assert!(result.result().is_none());
    let text = result.diagnostics_text();
    assert!(text.contains("missing.h"), "{text}");
    assert!(text.contains("hlsl.hlsl:1:"), "{text}");
}

#[test]
fn validating_valid_shader_leaves_it_untouched() {
    let shader = compile(
        "float4 main() : SV_Target { return 0; }",
        "main",
        ShaderTarget::PS_6_0,
    )
    .unwrap();
    let result = Validator::new().validate(&shader, ValidatorFlags::DEFAULT);
    assert_eq!(result.status(), HResult::S_OK, "{}", result.diagnostics_text());
    assert_eq!(result.result().unwrap().as_bytes(), shader.as_bytes());

    let unsigned = assemble(VALID_IR).result().cloned().unwrap();
    let result = Validator::new().validate(&unsigned, ValidatorFlags::DEFAULT);
    assert_eq!(result.result().unwrap().as_bytes(), unsigned.as_bytes());
    let edited = Validator::new().validate(&unsigned, ValidatorFlags::IN_PLACE_EDIT);
    assert!(Container::load(edited.result().unwrap()).unwrap().is_signed());
}

#[test]
fn disassembly_shows_module_structure() {
    let container = assemble(VALID_IR).result().cloned().unwrap();
    let text = disassemble(&container).unwrap().to_text().unwrap();
    assert!(!text.is_empty());
    for token in ["target ps_6_0", "entry @main", "define float4 @main(", "define float4 @scale(", "ret color"] {
        assert!(text.contains(token), "missing {token:?} in\n{text}");
    }
}
