//! The type contract and the embedded-buffer emission protocol.
//!
//! Every kind of type the generator understands implements [`Type`]. The
//! contract covers naming, the three declaration spellings, the layout
//! queries driving the embedded pass, and the emission entry points for
//! declarations, definitions, and reader/writer bodies.
//!
//! Types reference each other through [`TypeId`] indices into a
//! [`TypeArena`]; nothing in the graph owns anything else, so a field and a
//! queue element can share a referenced type without lifetime plumbing.
//!
//! The hard part lives at the bottom of this module:
//! [`emit_reader_writer_embedded_for_type_name`] prints the
//! parent-handle-plus-offset validation call that every out-of-line kind
//! delegates to, and [`ErrorMode`] selects the failure shape the generated
//! code uses around it.

pub mod compound;
pub mod fmq;
pub mod leaf;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::fmt::Formatter;

/// Name of the status variable shared by every generated function body.
pub const STATUS_VAR: &str = "_pcl_err";

/// Name of the shared failure label used under [`ErrorMode::Goto`].
pub const ERROR_LABEL: &str = "_pcl_error";

/// Spelling of the generated status type.
pub const STATUS_TYPE: &str = "::parcel::status_t";

/// Success value of the generated status type.
pub const STATUS_OK: &str = "::parcel::OK";

/// Status stored when a buffer read hands back a null region.
pub const STATUS_UNKNOWN: &str = "::parcel::UNKNOWN_ERROR";

/// Spelling of the transport buffer type in generated code.
pub const PARCEL_TYPE: &str = "::parcel::Parcel";

#[derive(Error, Debug)]
pub enum EmitError {
    /// The type is a pure container or reference and has no wire form of
    /// its own, so nobody may ask it for a reader/writer.
    #[error("`{0}` is not a transferable value type")]
    NotTransferable(String),

    /// Queue element types must be flat and must not be interface
    /// references; anything else cannot live inside a registered region.
    #[error("queue element type `{0}` must be flat and non-interface")]
    IncompatibleElementType(String),
}

// ============================================================================
// Arena
// ============================================================================

/// Stable index of a type registered in a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// Append-only store owning every type in one generation pass.
///
/// Ids are never invalidated. Looking an id up is infallible by
/// construction: the only way to obtain a `TypeId` is from `register`, and
/// types are never removed.
#[derive(Default)]
pub struct TypeArena {
    types: Vec<Box<dyn Type>>,
}

impl std::fmt::Debug for TypeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeArena")
            .field("len", &self.types.len())
            .finish()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: Box<dyn Type>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &dyn Type {
        self.types[id.0 as usize].as_ref()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ============================================================================
// Declaration spellings
// ============================================================================

/// How a value of some type is being declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// A local or field, held by value.
    Stack,
    /// An incoming parameter.
    Argument,
    /// An outgoing result.
    Result,
}

/// A declaration spelling plus any trailing declarator text.
///
/// The trailing part exists for array dimensions, which attach after the
/// declared name rather than to the type; every kind defined in this crate
/// leaves it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetType {
    pub spelling: String,
    pub extra: String,
}

impl TargetType {
    pub fn plain(spelling: impl Into<String>) -> Self {
        Self {
            spelling: spelling.into(),
            extra: String::new(),
        }
    }
}

// ============================================================================
// Parcel access paths
// ============================================================================

/// The expression through which generated code reaches the transport
/// buffer, together with whether that expression is a pointer.
///
/// Readers hold the parcel by const reference and writers by pointer, so
/// emission sites need all three spellings of the same access path.
#[derive(Debug, Clone, Copy)]
pub struct ParcelObj<'a> {
    expr: &'a str,
    is_pointer: bool,
}

impl<'a> ParcelObj<'a> {
    pub fn reference(expr: &'a str) -> Self {
        Self {
            expr,
            is_pointer: false,
        }
    }

    pub fn pointer(expr: &'a str) -> Self {
        Self {
            expr,
            is_pointer: true,
        }
    }

    /// Member-access prefix: `parcel.` or `parcel->`.
    pub fn member(&self) -> String {
        if self.is_pointer {
            format!("{}->", self.expr)
        } else {
            format!("{}.", self.expr)
        }
    }

    /// The parcel as a value expression: `*parcel` or `parcel`.
    pub fn value_expr(&self) -> String {
        if self.is_pointer {
            format!("*{}", self.expr)
        } else {
            self.expr.to_string()
        }
    }

    /// The parcel as a pointer expression: `parcel` or `&parcel`.
    pub fn pointer_expr(&self) -> String {
        if self.is_pointer {
            self.expr.to_string()
        } else {
            format!("&{}", self.expr)
        }
    }
}

// ============================================================================
// Error propagation
// ============================================================================

/// The code shape generated around a failed buffer operation.
///
/// Both shapes fail fast: side effects up to the failing field are kept and
/// nothing past it is touched. The choice only affects how control leaves
/// the generated function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Return the status value directly at the point of failure.
    Return,
    /// Jump to the single shared failure label of the enclosing generated
    /// function, which returns the shared status variable. Used whenever
    /// one function body processes several fields, so every step shares
    /// one exit path.
    Goto,
}

/// Emit the conditional check that follows a status-returning call.
pub fn handle_error(out: &mut Formatter, mode: ErrorMode) {
    match mode {
        ErrorMode::Return => {
            out.line(&format!(
                "if ({STATUS_VAR} != {STATUS_OK}) {{ return {STATUS_VAR}; }}"
            ));
        }
        ErrorMode::Goto => {
            out.line(&format!(
                "if ({STATUS_VAR} != {STATUS_OK}) {{ goto {ERROR_LABEL}; }}"
            ));
        }
    }
    out.blank();
}

/// Emit the bare exit inside a block where the status has already been
/// assigned, e.g. after a null-region check.
pub fn handle_error_inline(out: &mut Formatter, mode: ErrorMode) {
    match mode {
        ErrorMode::Return => out.line(&format!("return {STATUS_VAR};")),
        ErrorMode::Goto => out.line(&format!("goto {ERROR_LABEL};")),
    }
}

// ============================================================================
// The type contract
// ============================================================================

/// The capability set every concrete type kind implements.
///
/// Implementations are constructed once while a package document is
/// lowered, then treated as read-only for the whole generation pass. All
/// queries that must resolve a referenced type take the arena.
pub trait Type {
    /// Fully-qualified emitted-language name.
    fn name(&self) -> &str;

    /// Like [`Type::name`], but allows a parametrized spelling (queues
    /// append their element type as a template argument).
    fn full_name(&self, _arena: &TypeArena) -> String {
        self.name().to_string()
    }

    /// Declaration spelling for the given storage mode.
    fn target_type(&self, _arena: &TypeArena, _mode: StorageMode) -> TargetType {
        TargetType::plain(self.name())
    }

    fn is_interface(&self) -> bool {
        false
    }

    /// Whether the wire form of this type needs the out-of-line pass after
    /// the flat copy. Pure query, no side effects.
    fn needs_embedded_read_write(&self, _arena: &TypeArena) -> bool {
        false
    }

    /// Whether a [`StorageMode::Result`] value must be dereferenced before
    /// use by callers.
    fn result_needs_deref(&self) -> bool {
        false
    }

    /// Whether the type is valid in a managed-runtime binding.
    fn is_java_compatible(&self, _arena: &TypeArena) -> bool {
        true
    }

    /// Write the type's structural declaration.
    fn emit_type_declarations(
        &self,
        _arena: &TypeArena,
        _out: &mut Formatter,
    ) -> Result<(), EmitError> {
        Ok(())
    }

    /// Write any out-of-line member-function bodies, qualified with
    /// `enclosing_prefix` when non-empty. A failure from a nested scope
    /// propagates unchanged and stops emission for this type.
    fn emit_type_definitions(
        &self,
        _arena: &TypeArena,
        _out: &mut Formatter,
        _enclosing_prefix: &str,
    ) -> Result<(), EmitError> {
        Ok(())
    }

    /// Emit the root-level transfer of a value of this type: the flat
    /// buffer registration/lookup, followed by the embedded pass when the
    /// type requires one. Only value types override this.
    fn emit_reader_writer(
        &self,
        _arena: &TypeArena,
        _out: &mut Formatter,
        _name: &str,
        _parcel: ParcelObj<'_>,
        _is_reader: bool,
        _mode: ErrorMode,
    ) -> Result<(), EmitError> {
        Err(EmitError::NotTransferable(self.name().to_string()))
    }

    /// Emit this type's part of an enclosing embedded pass: validate or
    /// relocate the sub-region at `offset_text` relative to `parent_name`.
    ///
    /// Types covered entirely by the flat copy contribute nothing here.
    #[allow(clippy::too_many_arguments)]
    fn emit_reader_writer_embedded(
        &self,
        _arena: &TypeArena,
        _out: &mut Formatter,
        _name: &str,
        _name_is_pointer: bool,
        _parcel: ParcelObj<'_>,
        _is_reader: bool,
        _mode: ErrorMode,
        _parent_name: &str,
        _offset_text: &str,
    ) -> Result<(), EmitError> {
        Ok(())
    }

    /// Contribute named types reachable from this one, for cross-file
    /// dependency tracking. Container kinds override this.
    fn add_named_types_to_set(&self, _arena: &TypeArena, _set: &mut BTreeSet<String>) {}

    /// Human-readable rendering, for debugging.
    fn dump(&self, _arena: &TypeArena, out: &mut Formatter) {
        out.write(self.name());
    }
}

// ============================================================================
// The shared embedded call
// ============================================================================

/// Print the validation/relocation call for one out-of-line sub-region.
///
/// This is the single routine every embedded-capable kind routes through.
/// `type_name` selects the runtime entry point; `func_namespace` qualifies
/// it (queues pass their runtime namespace, everything else resolves in
/// `::parcel`). The value is passed mutably on the read path, which needs a
/// `const_cast` because root reads hand out const regions.
#[allow(clippy::too_many_arguments)]
pub fn emit_reader_writer_embedded_for_type_name(
    out: &mut Formatter,
    name: &str,
    name_is_pointer: bool,
    parcel: ParcelObj<'_>,
    is_reader: bool,
    mode: ErrorMode,
    parent_name: &str,
    offset_text: &str,
    type_name: &str,
    func_namespace: &str,
) {
    let space = if func_namespace.is_empty() {
        "::parcel"
    } else {
        func_namespace
    };

    let derefed = if name_is_pointer {
        format!("*{name}")
    } else {
        name.to_string()
    };

    if is_reader {
        out.line(&format!("{STATUS_VAR} = {space}::readEmbeddedFromParcel("));
        out.indent();
        out.indent();
        out.line(&format!("const_cast<{type_name} &>({derefed}),"));
        out.line(&format!("{},", parcel.value_expr()));
        out.line(&format!("{parent_name},"));
        out.line(&format!("{offset_text});"));
        out.unindent();
        out.unindent();
    } else {
        out.line(&format!("{STATUS_VAR} = {space}::writeEmbeddedToParcel("));
        out.indent();
        out.indent();
        out.line(&format!("{derefed},"));
        out.line(&format!("{},", parcel.pointer_expr()));
        out.line(&format!("{parent_name},"));
        out.line(&format!("{offset_text});"));
        out.unindent();
        out.unindent();
    }

    handle_error(out, mode);
}
