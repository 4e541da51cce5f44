//! Leaf type kinds: scalars, the runtime string, interface references.

use crate::fmt::Formatter;

use super::{
    emit_reader_writer_embedded_for_type_name, EmitError, ErrorMode, ParcelObj, StorageMode,
    TargetType, Type, TypeArena,
};

// ============================================================================
// Scalars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
}

impl ScalarKind {
    /// The emitted-language spelling.
    pub fn spelling(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8_t",
            ScalarKind::Uint8 => "uint8_t",
            ScalarKind::Int16 => "int16_t",
            ScalarKind::Uint16 => "uint16_t",
            ScalarKind::Int32 => "int32_t",
            ScalarKind::Uint32 => "uint32_t",
            ScalarKind::Int64 => "int64_t",
            ScalarKind::Uint64 => "uint64_t",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    /// Parse the keyword used in package documents.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "bool" => ScalarKind::Bool,
            "int8" => ScalarKind::Int8,
            "uint8" => ScalarKind::Uint8,
            "int16" => ScalarKind::Int16,
            "uint16" => ScalarKind::Uint16,
            "int32" => ScalarKind::Int32,
            "uint32" => ScalarKind::Uint32,
            "int64" => ScalarKind::Int64,
            "uint64" => ScalarKind::Uint64,
            "float" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            _ => return None,
        })
    }
}

/// A fixed-size primitive. Entirely covered by the flat copy.
pub struct ScalarType {
    kind: ScalarKind,
}

impl ScalarType {
    pub fn new(kind: ScalarKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }
}

impl Type for ScalarType {
    fn name(&self) -> &str {
        self.kind.spelling()
    }

    fn target_type(&self, _arena: &TypeArena, mode: StorageMode) -> TargetType {
        match mode {
            StorageMode::Stack | StorageMode::Argument => TargetType::plain(self.name()),
            StorageMode::Result => TargetType::plain(format!("{} *", self.name())),
        }
    }
}

// ============================================================================
// Strings
// ============================================================================

/// The runtime string. Its character payload lives out of line, so the
/// embedded pass re-validates it against the parent region.
pub struct StringType;

impl StringType {
    pub const SPELLING: &'static str = "::parcel::String";
}

impl Type for StringType {
    fn name(&self) -> &str {
        Self::SPELLING
    }

    fn target_type(&self, _arena: &TypeArena, mode: StorageMode) -> TargetType {
        match mode {
            StorageMode::Stack => TargetType::plain(Self::SPELLING),
            StorageMode::Argument => TargetType::plain(format!("const {}&", Self::SPELLING)),
            StorageMode::Result => TargetType::plain(format!("const {}*", Self::SPELLING)),
        }
    }

    fn needs_embedded_read_write(&self, _arena: &TypeArena) -> bool {
        true
    }

    fn result_needs_deref(&self) -> bool {
        true
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
            Self::SPELLING,
            "",
        );
        Ok(())
    }
}

// ============================================================================
// Interface references
// ============================================================================

/// A reference to a remote interface. Transferred as a runtime handle, so
/// it needs no embedded pass of its own, but it may never be stored inside
/// a queue region.
pub struct InterfaceType {
    name: String,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Type for InterfaceType {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self, _arena: &TypeArena, mode: StorageMode) -> TargetType {
        let base = format!("::parcel::Ref<{}>", self.name);
        match mode {
            StorageMode::Stack => TargetType::plain(base),
            StorageMode::Argument => TargetType::plain(format!("const {base}&")),
            StorageMode::Result => TargetType::plain(format!("const {base}*")),
        }
    }

    fn is_interface(&self) -> bool {
        true
    }
}
