//! The generation driver.
//!
//! Resolves fully-qualified type names against a tree of package documents,
//! lowers each document into a [`TypeArena`], and walks every requested
//! type through the contract in order: declaration emission, definition
//! emission, root read/write emission.
//!
//! A package document is a JSON file describing the package's types; the
//! file for `com.example.gfx` lives at `com/example/gfx.json` under the
//! interface root. Type references inside a document are spelled as
//! strings: a scalar keyword (`int32`, ...), `string`, or the name of a
//! type declared earlier in the same document.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::fmt::Formatter;
use crate::types::compound::{CompoundField, CompoundType, Scope, Style};
use crate::types::fmq::FmqType;
use crate::types::leaf::{InterfaceType, ScalarKind, ScalarType, StringType};
use crate::types::{
    EmitError, ErrorMode, ParcelObj, StorageMode, Type, TypeArena, TypeId, PARCEL_TYPE, STATUS_OK,
    STATUS_TYPE, STATUS_VAR,
};

/// Namespace the queue runtime lives in, as spelled in generated code.
const FMQ_NAMESPACE: &str = "::parcel::fmq";

/// Base name of the queue descriptor type.
const FMQ_BASE: &str = "Descriptor";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("invalid fully-qualified name `{0}` (expected package.Type)")]
    InvalidName(String),

    #[error("package `{0}` not found under the interface root")]
    UnknownPackage(String),

    #[error("document declares package `{declared}` but was loaded for `{requested}`")]
    PackageMismatch { declared: String, requested: String },

    #[error("type `{ty}` is not declared in package `{package}`")]
    UnknownType { ty: String, package: String },

    #[error("field `{field}` references unknown type `{ty}`")]
    UnresolvedFieldType { field: String, ty: String },

    #[error("duplicate type name `{0}` in package")]
    DuplicateType(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed package document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Emit(#[from] EmitError),
}

// ============================================================================
// Package documents
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PackageDoc {
    pub package: String,
    #[serde(default)]
    pub types: Vec<TypeDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDesc {
    Struct {
        name: String,
        #[serde(default)]
        types: Vec<TypeDesc>,
        #[serde(default)]
        fields: Vec<FieldDesc>,
    },
    Union {
        name: String,
        #[serde(default)]
        types: Vec<TypeDesc>,
        #[serde(default)]
        fields: Vec<FieldDesc>,
    },
    Fmq {
        name: String,
        element: String,
    },
    Interface {
        name: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct FieldDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

// ============================================================================
// Lowering
// ============================================================================

/// A fully lowered package: the arena owning every type, the root scope
/// listing top-level declarations in document order, and the name table.
#[derive(Debug)]
pub struct Package {
    name: String,
    arena: TypeArena,
    root: Scope,
    names: HashMap<String, TypeId>,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    pub fn lookup(&self, type_name: &str) -> Option<TypeId> {
        self.names.get(type_name).copied()
    }
}

struct Lowering {
    arena: TypeArena,
    names: HashMap<String, TypeId>,
    builtins: HashMap<String, TypeId>,
}

impl Lowering {
    fn new() -> Self {
        Self {
            arena: TypeArena::new(),
            names: HashMap::new(),
            builtins: HashMap::new(),
        }
    }

    /// Resolve a type-reference string to an arena id, registering builtin
    /// kinds on first use.
    fn resolve(&mut self, field: &str, reference: &str) -> Result<TypeId, DriverError> {
        if let Some(id) = self.names.get(reference) {
            return Ok(*id);
        }
        if let Some(id) = self.builtins.get(reference) {
            return Ok(*id);
        }

        if let Some(kind) = ScalarKind::from_keyword(reference) {
            let id = self.arena.register(Box::new(ScalarType::new(kind)));
            self.builtins.insert(reference.to_string(), id);
            return Ok(id);
        }
        if reference == "string" {
            let id = self.arena.register(Box::new(StringType));
            self.builtins.insert(reference.to_string(), id);
            return Ok(id);
        }

        Err(DriverError::UnresolvedFieldType {
            field: field.to_string(),
            ty: reference.to_string(),
        })
    }

    /// Declared names share one package-wide table, nested or not; nesting
    /// only affects where a declaration is emitted.
    fn bind(&mut self, name: &str, id: TypeId) -> Result<(), DriverError> {
        if self.names.insert(name.to_string(), id).is_some() {
            return Err(DriverError::DuplicateType(name.to_string()));
        }
        Ok(())
    }

    fn lower(&mut self, desc: &TypeDesc) -> Result<TypeId, DriverError> {
        match desc {
            TypeDesc::Struct {
                name,
                types,
                fields,
            } => self.lower_compound(Style::Struct, name, types, fields),
            TypeDesc::Union {
                name,
                types,
                fields,
            } => self.lower_compound(Style::Union, name, types, fields),
            TypeDesc::Fmq { name, element } => {
                let elem = self.resolve(name, element)?;
                let fmq = FmqType::new(&self.arena, FMQ_NAMESPACE, FMQ_BASE, elem)?;
                let id = self.arena.register(Box::new(fmq));
                self.bind(name, id)?;
                Ok(id)
            }
            TypeDesc::Interface { name } => {
                let id = self.arena.register(Box::new(InterfaceType::new(name)));
                self.bind(name, id)?;
                Ok(id)
            }
        }
    }

    fn lower_compound(
        &mut self,
        style: Style,
        name: &str,
        types: &[TypeDesc],
        fields: &[FieldDesc],
    ) -> Result<TypeId, DriverError> {
        // Nested declarations first, so fields can reference them.
        let mut nested = Vec::new();
        for desc in types {
            nested.push(self.lower(desc)?);
        }

        let mut compound_fields = Vec::new();
        for field in fields {
            let ty = self.resolve(&field.name, &field.ty)?;
            compound_fields.push(CompoundField::new(&field.name, ty));
        }

        let mut compound = CompoundType::new(style, name, compound_fields);
        for child in nested {
            compound.push_nested_type(child);
        }

        let id = self.arena.register(Box::new(compound));
        self.bind(name, id)?;
        Ok(id)
    }
}

fn lower_package(doc: &PackageDoc) -> Result<Package, DriverError> {
    let mut lowering = Lowering::new();
    let mut root = Scope::new(doc.package.clone());

    for desc in &doc.types {
        let id = lowering.lower(desc)?;
        root.push(id);
    }

    Ok(Package {
        name: doc.package.clone(),
        arena: lowering.arena,
        root,
        names: lowering.names,
    })
}

// ============================================================================
// Coordinator
// ============================================================================

/// Resolves fully-qualified names, caches lowered packages, and writes the
/// generated sources.
pub struct Coordinator {
    root: PathBuf,
    cache: HashMap<String, Package>,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
        }
    }

    /// Split `com.example.gfx.Frame` into the package and type name.
    fn split_fqname(fqname: &str) -> Result<(&str, &str), DriverError> {
        let invalid = || DriverError::InvalidName(fqname.to_string());

        let (package, type_name) = fqname.rsplit_once('.').ok_or_else(invalid)?;
        let segment_ok = |s: &str| {
            !s.is_empty()
                && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !package.split('.').all(segment_ok) || !segment_ok(type_name) {
            return Err(invalid());
        }
        Ok((package, type_name))
    }

    fn package_path(&self, package: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in package.split('.') {
            path.push(segment);
        }
        path.set_extension("json");
        path
    }

    /// Load and lower a package document, or hand back the cached model.
    pub fn parse(&mut self, package: &str) -> Result<&Package, DriverError> {
        if !self.cache.contains_key(package) {
            let path = self.package_path(package);
            tracing::debug!(package, path = %path.display(), "loading package document");

            let text = fs::read_to_string(&path).map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    DriverError::UnknownPackage(package.to_string())
                } else {
                    DriverError::Io {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
            let doc: PackageDoc = serde_json::from_str(&text).map_err(|source| {
                DriverError::Document {
                    path: path.clone(),
                    source,
                }
            })?;
            if doc.package != package {
                return Err(DriverError::PackageMismatch {
                    declared: doc.package,
                    requested: package.to_string(),
                });
            }

            self.cache.insert(package.to_string(), lower_package(&doc)?);
        }

        Ok(&self.cache[package])
    }

    /// Generate `<Type>.h` and `<Type>.cpp` for one fully-qualified name.
    pub fn generate(&mut self, fqname: &str, out_dir: &Path) -> Result<(), DriverError> {
        let (package_name, type_name) = Self::split_fqname(fqname)?;
        let package = self.parse(package_name)?;

        let id = package.lookup(type_name).ok_or_else(|| DriverError::UnknownType {
            ty: type_name.to_string(),
            package: package_name.to_string(),
        })?;
        let ty = package.arena().get(id);

        let mut dir = out_dir.to_path_buf();
        for segment in package_name.split('.') {
            dir.push(segment);
        }
        fs::create_dir_all(&dir).map_err(|source| DriverError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut out = Formatter::new();
        out.line("#pragma once");
        out.blank();
        out.line("#include <parcel/parcel.h>");
        out.blank();
        ty.emit_type_declarations(package.arena(), &mut out)?;
        let header = dir.join(format!("{type_name}.h"));
        fs::write(&header, out.finish()).map_err(|source| DriverError::Io {
            path: header.clone(),
            source,
        })?;

        let mut out = Formatter::new();
        out.line(&format!("#include \"{type_name}.h\""));
        out.blank();
        ty.emit_type_definitions(package.arena(), &mut out, "")?;
        emit_root_transfer(package.arena(), ty, &mut out)?;
        let source_path = dir.join(format!("{type_name}.cpp"));
        fs::write(&source_path, out.finish()).map_err(|source| DriverError::Io {
            path: source_path.clone(),
            source,
        })?;

        tracing::info!(
            fqname,
            header = %header.display(),
            source = %source_path.display(),
            "generated"
        );
        Ok(())
    }
}

/// Emit the two standalone root transfer functions for one type.
///
/// These are the entry points the transport layer calls; everything they
/// contain comes out of the type's own `emit_reader_writer`, under the
/// return-immediately policy.
fn emit_root_transfer(
    arena: &TypeArena,
    ty: &dyn Type,
    out: &mut Formatter,
) -> Result<(), EmitError> {
    let stack = ty.target_type(arena, StorageMode::Stack);

    out.line(&format!(
        "{STATUS_TYPE} readFromParcel(const {} *&obj, const {PARCEL_TYPE} &parcel) {{",
        stack.spelling
    ));
    out.indent();
    out.line(&format!("{STATUS_TYPE} {STATUS_VAR} = {STATUS_OK};"));
    out.blank();
    ty.emit_reader_writer(
        arena,
        out,
        "obj",
        ParcelObj::reference("parcel"),
        true,
        ErrorMode::Return,
    )?;
    out.line(&format!("return {STATUS_VAR};"));
    out.unindent();
    out.line("}");
    out.blank();

    out.line(&format!(
        "{STATUS_TYPE} writeToParcel(const {} &obj, {PARCEL_TYPE} *parcel) {{",
        stack.spelling
    ));
    out.indent();
    out.line(&format!("{STATUS_TYPE} {STATUS_VAR} = {STATUS_OK};"));
    out.blank();
    ty.emit_reader_writer(
        arena,
        out,
        "obj",
        ParcelObj::pointer("parcel"),
        false,
        ErrorMode::Return,
    )?;
    out.line(&format!("return {STATUS_VAR};"));
    out.unindent();
    out.line("}");
    out.blank();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> PackageDoc {
        serde_json::from_str(text).expect("document parses")
    }

    #[test]
    fn split_fqname_accepts_dotted_names() {
        let (package, ty) = Coordinator::split_fqname("com.example.gfx.Frame").unwrap();
        assert_eq!(package, "com.example.gfx");
        assert_eq!(ty, "Frame");
    }

    #[test]
    fn split_fqname_rejects_bad_input() {
        assert!(Coordinator::split_fqname("Frame").is_err());
        assert!(Coordinator::split_fqname(".Frame").is_err());
        assert!(Coordinator::split_fqname("com..gfx.Frame").is_err());
        assert!(Coordinator::split_fqname("com.example.").is_err());
        assert!(Coordinator::split_fqname("com.ex/ample.Frame").is_err());
        assert!(Coordinator::split_fqname("com.1bad.Frame").is_err());
    }

    #[test]
    fn lowers_structs_queues_and_builtins() {
        let doc = doc(
            r#"{
                "package": "com.example.gfx",
                "types": [
                    {"kind": "fmq", "name": "PixelQueue", "element": "uint8"},
                    {"kind": "struct", "name": "Frame", "fields": [
                        {"name": "width", "type": "uint32"},
                        {"name": "label", "type": "string"},
                        {"name": "pixels", "type": "PixelQueue"}
                    ]}
                ]
            }"#,
        );
        let package = lower_package(&doc).unwrap();

        assert_eq!(package.name(), "com.example.gfx");
        assert_eq!(package.root().children().len(), 2);

        let frame = package.lookup("Frame").expect("Frame declared");
        let ty = package.arena().get(frame);
        assert!(ty.needs_embedded_read_write(package.arena()));
        assert!(package.lookup("PixelQueue").is_some());
        assert!(package.lookup("Missing").is_none());
    }

    #[test]
    fn nested_types_are_reachable_from_fields() {
        let doc = doc(
            r#"{
                "package": "com.example.gfx",
                "types": [
                    {"kind": "struct", "name": "Outer",
                     "types": [
                        {"kind": "struct", "name": "Inner", "fields": [
                            {"name": "x", "type": "int32"}
                        ]}
                     ],
                     "fields": [{"name": "inner", "type": "Inner"}]}
                ]
            }"#,
        );
        let package = lower_package(&doc).unwrap();
        assert!(package.lookup("Inner").is_some());
        assert!(package.lookup("Outer").is_some());
    }

    #[test]
    fn unknown_field_reference_is_an_error() {
        let doc = doc(
            r#"{
                "package": "p",
                "types": [
                    {"kind": "struct", "name": "S", "fields": [
                        {"name": "x", "type": "Nope"}
                    ]}
                ]
            }"#,
        );
        let err = lower_package(&doc).unwrap_err();
        assert!(matches!(
            err,
            DriverError::UnresolvedFieldType { ref field, ref ty } if field == "x" && ty == "Nope"
        ));
    }

    #[test]
    fn duplicate_declarations_are_an_error() {
        let doc = doc(
            r#"{
                "package": "p",
                "types": [
                    {"kind": "interface", "name": "I"},
                    {"kind": "interface", "name": "I"}
                ]
            }"#,
        );
        assert!(matches!(
            lower_package(&doc).unwrap_err(),
            DriverError::DuplicateType(_)
        ));
    }

    #[test]
    fn queue_of_interface_is_rejected_during_lowering() {
        let doc = doc(
            r#"{
                "package": "p",
                "types": [
                    {"kind": "interface", "name": "IRenderer"},
                    {"kind": "fmq", "name": "Bad", "element": "IRenderer"}
                ]
            }"#,
        );
        assert!(matches!(
            lower_package(&doc).unwrap_err(),
            DriverError::Emit(EmitError::IncompatibleElementType(_))
        ));
    }

    #[test]
    fn builtin_references_are_shared() {
        let doc = doc(
            r#"{
                "package": "p",
                "types": [
                    {"kind": "struct", "name": "S", "fields": [
                        {"name": "a", "type": "int32"},
                        {"name": "b", "type": "int32"}
                    ]}
                ]
            }"#,
        );
        let package = lower_package(&doc).unwrap();
        // One scalar registration plus the struct itself.
        assert_eq!(package.arena().len(), 2);
    }
}
