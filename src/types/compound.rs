//! Compound (struct/union) types and the scopes that nest them.

use std::collections::BTreeSet;

use crate::fmt::Formatter;

use super::{
    emit_reader_writer_embedded_for_type_name, handle_error, handle_error_inline, EmitError,
    ErrorMode, ParcelObj, StorageMode, TargetType, Type, TypeArena, TypeId, PARCEL_TYPE,
    STATUS_OK, STATUS_TYPE, STATUS_UNKNOWN, STATUS_VAR,
};

// ============================================================================
// Scope
// ============================================================================

/// An ordered, named container of type declarations.
///
/// Insertion order is declaration order in emitted output. A scope nests
/// inside every [`CompoundType`] and also serves as a package root.
#[derive(Debug)]
pub struct Scope {
    name: String,
    children: Vec<TypeId>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: TypeId) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[TypeId] {
        &self.children
    }
}

impl Type for Scope {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit_type_declarations(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
    ) -> Result<(), EmitError> {
        for child in &self.children {
            arena.get(*child).emit_type_declarations(arena, out)?;
        }
        Ok(())
    }

    fn emit_type_definitions(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
        enclosing_prefix: &str,
    ) -> Result<(), EmitError> {
        for child in &self.children {
            arena
                .get(*child)
                .emit_type_definitions(arena, out, enclosing_prefix)?;
        }
        Ok(())
    }

    fn add_named_types_to_set(&self, arena: &TypeArena, set: &mut BTreeSet<String>) {
        for child in &self.children {
            arena.get(*child).add_named_types_to_set(arena, set);
        }
    }

    fn dump(&self, arena: &TypeArena, out: &mut Formatter) {
        for child in &self.children {
            arena.get(*child).dump(arena, out);
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// A (name, type) pair owned by a [`CompoundType`]. The referenced type is
/// owned by the arena, not by the field.
pub struct CompoundField {
    name: String,
    ty: TypeId,
}

impl CompoundField {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    fn dump(&self, arena: &TypeArena, out: &mut Formatter) {
        arena.get(self.ty).dump(arena, out);
        out.write(&format!(" {};", self.name));
    }
}

// ============================================================================
// CompoundType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Struct,
    Union,
}

impl Style {
    fn keyword(self) -> &'static str {
        match self {
            Style::Struct => "struct",
            Style::Union => "union",
        }
    }
}

/// A struct- or union-style aggregate of named fields, with a nested scope
/// for inner type declarations.
///
/// The field list is complete at construction, so a half-built compound is
/// unrepresentable. Nested types may still be appended before emission
/// begins; emission itself never mutates the type.
pub struct CompoundType {
    scope: Scope,
    style: Style,
    fields: Vec<CompoundField>,
}

impl CompoundType {
    pub fn new(style: Style, name: impl Into<String>, fields: Vec<CompoundField>) -> Self {
        Self {
            scope: Scope::new(name),
            style,
            fields,
        }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn fields(&self) -> &[CompoundField] {
        &self.fields
    }

    /// Append a nested type declaration to the inner scope.
    pub fn push_nested_type(&mut self, child: TypeId) {
        self.scope.push(child);
    }

    /// Emit one embedded reader or writer body as an out-of-line member
    /// definition.
    ///
    /// Fields are visited in declaration order; every field drives the
    /// shared status variable through the single failure label, so a
    /// failure on field *k* skips the remaining fields but still runs the
    /// epilogue. Fields whose types need no embedded handling were covered
    /// by the flat copy and contribute nothing.
    fn emit_struct_reader_writer(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
        enclosing_prefix: &str,
        is_reader: bool,
    ) -> Result<(), EmitError> {
        let qualified = if enclosing_prefix.is_empty() {
            self.name().to_string()
        } else {
            format!("{}::{}", enclosing_prefix, self.name())
        };
        let method = if is_reader {
            "readEmbeddedFromParcel"
        } else {
            "writeEmbeddedToParcel"
        };

        out.line(&format!("{STATUS_TYPE} {qualified}::{method}("));
        out.indent();
        out.indent();
        if is_reader {
            out.line(&format!("const {PARCEL_TYPE} &parcel,"));
        } else {
            out.line(&format!("{PARCEL_TYPE} *parcel,"));
        }
        out.line("size_t parentHandle,");
        if is_reader {
            out.line("size_t parentOffset) {");
        } else {
            out.line("size_t parentOffset) const {");
        }
        out.unindent();

        out.line(&format!("{STATUS_TYPE} {STATUS_VAR} = {STATUS_OK};"));
        out.blank();

        // The reader holds the parcel by reference, the writer by pointer.
        let parcel = if is_reader {
            ParcelObj::reference("parcel")
        } else {
            ParcelObj::pointer("parcel")
        };

        for field in &self.fields {
            let field_type = arena.get(field.type_id());
            if !field_type.needs_embedded_read_write(arena) {
                continue;
            }

            field_type.emit_reader_writer_embedded(
                arena,
                out,
                field.name(),
                false,
                parcel,
                is_reader,
                ErrorMode::Goto,
                "parentHandle",
                &format!("offsetof({}, {}) + parentOffset", self.name(), field.name()),
            )?;
        }

        out.unindent();
        out.line(&format!("{}:", super::ERROR_LABEL));
        out.indent();
        out.line(&format!("return {STATUS_VAR};"));

        out.unindent();
        out.line("}");
        out.blank();

        Ok(())
    }
}

impl Type for CompoundType {
    fn name(&self) -> &str {
        self.scope.name()
    }

    fn target_type(&self, _arena: &TypeArena, mode: StorageMode) -> TargetType {
        let base = self.name();
        match mode {
            StorageMode::Stack => TargetType::plain(base),
            StorageMode::Argument => TargetType::plain(format!("const {base}&")),
            StorageMode::Result => TargetType::plain(format!("const {base}*")),
        }
    }

    fn needs_embedded_read_write(&self, arena: &TypeArena) -> bool {
        // Only one union member is live at a time in emitted code, so the
        // struct-style out-of-line recursion does not apply to unions.
        if self.style != Style::Struct {
            return false;
        }

        self.fields
            .iter()
            .any(|f| arena.get(f.type_id()).needs_embedded_read_write(arena))
    }

    fn result_needs_deref(&self) -> bool {
        true
    }

    fn is_java_compatible(&self, arena: &TypeArena) -> bool {
        self.fields
            .iter()
            .all(|f| arena.get(f.type_id()).is_java_compatible(arena))
    }

    fn emit_type_declarations(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
    ) -> Result<(), EmitError> {
        out.line(&format!("{} {} {{", self.style.keyword(), self.name()));
        out.indent();

        self.scope.emit_type_declarations(arena, out)?;

        for field in &self.fields {
            let target = arena.get(field.type_id()).target_type(arena, StorageMode::Stack);
            out.line(&format!(
                "{} {}{};",
                target.spelling,
                field.name(),
                target.extra
            ));
        }

        if self.needs_embedded_read_write(arena) {
            out.blank();
            out.line(&format!("{STATUS_TYPE} readEmbeddedFromParcel("));
            out.indent();
            out.indent();
            out.line(&format!("const {PARCEL_TYPE} &parcel,"));
            out.line("size_t parentHandle,");
            out.line("size_t parentOffset);");
            out.unindent();
            out.unindent();

            out.blank();
            out.line(&format!("{STATUS_TYPE} writeEmbeddedToParcel("));
            out.indent();
            out.indent();
            out.line(&format!("{PARCEL_TYPE} *parcel,"));
            out.line("size_t parentHandle,");
            out.line("size_t parentOffset) const;");
            out.unindent();
            out.unindent();
        }

        out.unindent();
        out.line("};");
        out.blank();

        Ok(())
    }

    fn emit_type_definitions(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
        enclosing_prefix: &str,
    ) -> Result<(), EmitError> {
        let child_prefix = if enclosing_prefix.is_empty() {
            self.name().to_string()
        } else {
            format!("{}::{}", enclosing_prefix, self.name())
        };
        self.scope.emit_type_definitions(arena, out, &child_prefix)?;

        if !self.needs_embedded_read_write(arena) {
            return Ok(());
        }

        self.emit_struct_reader_writer(arena, out, enclosing_prefix, true)?;
        self.emit_struct_reader_writer(arena, out, enclosing_prefix, false)?;

        Ok(())
    }

    fn emit_reader_writer(
        &self,
        arena: &TypeArena,
        out: &mut Formatter,
        name: &str,
        parcel: ParcelObj<'_>,
        is_reader: bool,
        mode: ErrorMode,
    ) -> Result<(), EmitError> {
        let parent_name = format!("_pcl_{name}_parent");

        out.line(&format!("size_t {parent_name};"));
        out.blank();

        if is_reader {
            out.line(&format!(
                "{} = (const {} *){}readBuffer(&{});",
                name,
                self.name(),
                parcel.member(),
                parent_name
            ));
            out.line(&format!("if ({name} == nullptr) {{"));
            out.indent();
            out.line(&format!("{STATUS_VAR} = {STATUS_UNKNOWN};"));
            handle_error_inline(out, mode);
            out.unindent();
            out.line("}");
            out.blank();
        } else {
            out.line(&format!(
                "{STATUS_VAR} = {}writeBuffer(&{name}, sizeof({name}), &{parent_name});",
                parcel.member()
            ));
            handle_error(out, mode);
        }

        if self.style != Style::Struct || !self.needs_embedded_read_write(arena) {
            return Ok(());
        }

        self.emit_reader_writer_embedded(
            arena,
            out,
            name,
            is_reader,
            parcel,
            is_reader,
            mode,
            &parent_name,
            "0 /* parentOffset */",
        )
    }

    fn emit_reader_writer_embedded(
        &self,
        _arena: &TypeArena,
        out: &mut Formatter,
        name: &str,
        name_is_pointer: bool,
        parcel: ParcelObj<'_>,
        is_reader: bool,
        mode: ErrorMode,
        parent_name: &str,
        offset_text: &str,
    ) -> Result<(), EmitError> {
        emit_reader_writer_embedded_for_type_name(
            out,
            name,
            name_is_pointer,
            parcel,
            is_reader,
            mode,
            parent_name,
            offset_text,
            self.name(),
            "",
        );
        Ok(())
    }

    fn add_named_types_to_set(&self, arena: &TypeArena, set: &mut BTreeSet<String>) {
        set.insert(self.name().to_string());
        self.scope.add_named_types_to_set(arena, set);
        for field in &self.fields {
            arena.get(field.type_id()).add_named_types_to_set(arena, set);
        }
    }

    fn dump(&self, arena: &TypeArena, out: &mut Formatter) {
        out.line(&format!("{} {} {{", self.style.keyword(), self.name()));
        out.indent();

        self.scope.dump(arena, out);

        for field in &self.fields {
            field.dump(arena, out);
            out.blank();
        }

        out.unindent();
        out.line("};");
        out.blank();
    }
}
