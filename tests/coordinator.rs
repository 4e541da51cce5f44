use std::fs;
use std::path::PathBuf;

use parcelgen::{Coordinator, DriverError};

/// A scratch tree with one package document, cleaned up on drop.
struct Tree {
    root: PathBuf,
}

impl Tree {
    fn new(label: &str, package_path: &str, document: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "parcelgen-test-{}-{}",
            label,
            std::process::id()
        ));
        let file = root.join(package_path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, document).unwrap();
        Self { root }
    }

    fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

const GFX_DOC: &str = r#"{
    "package": "com.example.gfx",
    "types": [
        {"kind": "fmq", "name": "PixelQueue", "element": "uint8"},
        {"kind": "struct", "name": "Frame", "fields": [
            {"name": "width", "type": "uint32"},
            {"name": "height", "type": "uint32"},
            {"name": "label", "type": "string"},
            {"name": "pixels", "type": "PixelQueue"}
        ]},
        {"kind": "struct", "name": "Extent", "fields": [
            {"name": "w", "type": "int32"},
            {"name": "h", "type": "int32"}
        ]}
    ]
}"#;

#[test]
fn generates_header_and_source_for_a_struct() {
    let tree = Tree::new("frame", "com/example/gfx.json", GFX_DOC);
    let mut coordinator = Coordinator::new(&tree.root);

    coordinator
        .generate("com.example.gfx.Frame", &tree.out_dir())
        .unwrap();

    let dir = tree.out_dir().join("com/example/gfx");
    let header = fs::read_to_string(dir.join("Frame.h")).unwrap();
    let source = fs::read_to_string(dir.join("Frame.cpp")).unwrap();

    assert!(header.starts_with("#pragma once\n"));
    assert!(header.contains("struct Frame {"));
    assert!(header.contains("uint32_t width;"));
    assert!(header.contains("::parcel::String label;"));
    assert!(header.contains("::parcel::fmq::Descriptor<uint8_t> pixels;"));
    assert!(header.contains("readEmbeddedFromParcel("));
    assert!(header.contains("writeEmbeddedToParcel("));

    assert!(source.contains("#include \"Frame.h\""));
    assert!(source.contains("Frame::readEmbeddedFromParcel("));
    assert!(source.contains("Frame::writeEmbeddedToParcel("));
    assert!(source.contains("offsetof(Frame, label) + parentOffset);"));
    assert!(source.contains("offsetof(Frame, pixels) + parentOffset);"));
    // The flat fields stay out of the embedded bodies.
    assert!(!source.contains("offsetof(Frame, width)"));

    assert!(source.contains("readFromParcel(const Frame *&obj, const ::parcel::Parcel &parcel)"));
    assert!(source.contains("writeToParcel(const Frame &obj, ::parcel::Parcel *parcel)"));
}

#[test]
fn flat_struct_gets_no_embedded_surface() {
    let tree = Tree::new("extent", "com/example/gfx.json", GFX_DOC);
    let mut coordinator = Coordinator::new(&tree.root);

    coordinator
        .generate("com.example.gfx.Extent", &tree.out_dir())
        .unwrap();

    let dir = tree.out_dir().join("com/example/gfx");
    let header = fs::read_to_string(dir.join("Extent.h")).unwrap();
    let source = fs::read_to_string(dir.join("Extent.cpp")).unwrap();

    assert!(header.contains("struct Extent {"));
    assert!(!header.contains("Embedded"));
    assert!(!source.contains("Embedded"));
    assert!(source.contains("writeBuffer(&obj, sizeof(obj)"));
}

#[test]
fn one_document_load_serves_multiple_requests() {
    let tree = Tree::new("cached", "com/example/gfx.json", GFX_DOC);
    let mut coordinator = Coordinator::new(&tree.root);

    coordinator
        .generate("com.example.gfx.Frame", &tree.out_dir())
        .unwrap();

    // Make the document unreadable; the cached package must still serve.
    fs::remove_file(tree.root.join("com/example/gfx.json")).unwrap();

    coordinator
        .generate("com.example.gfx.Extent", &tree.out_dir())
        .unwrap();
}

#[test]
fn unknown_package_and_type_are_reported() {
    let tree = Tree::new("unknown", "com/example/gfx.json", GFX_DOC);
    let mut coordinator = Coordinator::new(&tree.root);

    assert!(matches!(
        coordinator.generate("com.example.audio.Frame", &tree.out_dir()),
        Err(DriverError::UnknownPackage(_))
    ));
    assert!(matches!(
        coordinator.generate("com.example.gfx.Missing", &tree.out_dir()),
        Err(DriverError::UnknownType { .. })
    ));
}

#[test]
fn mismatched_package_declaration_is_rejected() {
    let tree = Tree::new(
        "mismatch",
        "com/example/gfx.json",
        r#"{"package": "com.example.audio", "types": []}"#,
    );
    let mut coordinator = Coordinator::new(&tree.root);

    assert!(matches!(
        coordinator.generate("com.example.gfx.Frame", &tree.out_dir()),
        Err(DriverError::PackageMismatch { .. })
    ));
}

#[test]
fn malformed_documents_are_rejected() {
    let tree = Tree::new("malformed", "com/example/gfx.json", "{ not json");
    let mut coordinator = Coordinator::new(&tree.root);

    assert!(matches!(
        coordinator.generate("com.example.gfx.Frame", &tree.out_dir()),
        Err(DriverError::Document { .. })
    ));
}
