//! Resource-backed message-queue types.
//!
//! A queue's storage is a descriptor over shared-memory grantors, never a
//! flat region, so the embedded pass applies unconditionally and the kind
//! is excluded from managed-runtime bindings.

use std::collections::BTreeSet;

use crate::fmt::Formatter;

use super::{
    emit_reader_writer_embedded_for_type_name, handle_error, handle_error_inline, EmitError,
    ErrorMode, ParcelObj, StorageMode, TargetType, Type, TypeArena, TypeId, STATUS_UNKNOWN,
    STATUS_VAR,
};

/// An opaque queue descriptor, parameterized by one element type.
///
/// Fully determined at construction; [`FmqType::new`] refuses element
/// types the queue runtime cannot hold, so an invalid queue type is
/// unrepresentable.
#[derive(Debug)]
pub struct FmqType {
    namespace: String,
    fq_base: String,
    element: TypeId,
}

impl FmqType {
    pub fn new(
        arena: &TypeArena,
        namespace: &str,
        base: &str,
        element: TypeId,
    ) -> Result<Self, EmitError> {
        if !Self::is_compatible_element_type(arena, element) {
            return Err(EmitError::IncompatibleElementType(
                arena.get(element).full_name(arena),
            ));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            fq_base: if namespace.is_empty() {
                base.to_string()
            } else {
                format!("{namespace}::{base}")
            },
            element,
        })
    }

    /// A queue element must itself fit in the flat region its descriptor
    /// grants: interface references and types that need their own embedded
    /// handling are rejected.
    pub fn is_compatible_element_type(arena: &TypeArena, element: TypeId) -> bool {
        let ty = arena.get(element);
        !ty.is_interface() && !ty.needs_embedded_read_write(arena)
    }

    pub fn element_type(&self) -> TypeId {
        self.element
    }
}

impl Type for FmqType {
    fn name(&self) -> &str {
        &self.fq_base
    }

    fn full_name(&self, arena: &TypeArena) -> String {
        let element = arena
            .get(self.element)
            .target_type(arena, StorageMode::Stack);
        format!("{}<{}>", self.fq_base, element.spelling)
    }

    fn target_type(&self, arena: &TypeArena, mode: StorageMode) -> TargetType {
        let base = self.full_name(arena);
        match mode {
            StorageMode::Stack => TargetType::plain(base),
            StorageMode::Argument => TargetType::plain(format!("const {base}&")),
            StorageMode::Result => TargetType::plain(format!("const {base}*")),
        }
    }

    fn needs_embedded_read_write(&self, _arena: &TypeArena) -> bool {
        true
    }

    fn result_needs_deref(&self) -> bool {
        true
    }

    fn is_java_compatible(&self, _arena: &TypeArena) -> bool {
        false
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
                self.full_name(arena),
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

        // The descriptor's grantors are never flat, so the embedded pass
        // runs unconditionally.
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
        arena: &TypeArena,
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
            &self.full_name(arena),
            &self.namespace,
        );
        Ok(())
    }

    fn add_named_types_to_set(&self, _arena: &TypeArena, _set: &mut BTreeSet<String>) {
        // do nothing
    }

    fn dump(&self, arena: &TypeArena, out: &mut Formatter) {
        out.write(&self.full_name(arena));
    }
}

#[cfg(test)]
mod tests {
    use super::super::compound::{CompoundField, CompoundType, Style};
    use super::super::leaf::{InterfaceType, ScalarKind, ScalarType, StringType};
    use super::*;

    fn queue(arena: &mut TypeArena, kind: ScalarKind) -> FmqType {
        let elem = arena.register(Box::new(ScalarType::new(kind)));
        FmqType::new(arena, "::parcel::fmq", "Descriptor", elem).unwrap()
    }

    #[test]
    fn always_embedded_never_java() {
        let mut arena = TypeArena::new();
        let q = queue(&mut arena, ScalarKind::Uint16);
        assert!(q.needs_embedded_read_write(&arena));
        assert!(!q.is_java_compatible(&arena));
        assert!(q.result_needs_deref());
    }

    #[test]
    fn full_name_appends_element_spelling() {
        let mut arena = TypeArena::new();
        let q = queue(&mut arena, ScalarKind::Int64);
        assert_eq!(q.name(), "::parcel::fmq::Descriptor");
        assert_eq!(q.full_name(&arena), "::parcel::fmq::Descriptor<int64_t>");
        assert_eq!(
            q.target_type(&arena, StorageMode::Argument).spelling,
            "const ::parcel::fmq::Descriptor<int64_t>&"
        );
    }

    #[test]
    fn scalar_elements_are_compatible() {
        let mut arena = TypeArena::new();
        let elem = arena.register(Box::new(ScalarType::new(ScalarKind::Double)));
        assert!(FmqType::is_compatible_element_type(&arena, elem));
    }

    #[test]
    fn interface_elements_are_rejected() {
        let mut arena = TypeArena::new();
        let iface = arena.register(Box::new(InterfaceType::new("IRenderer")));
        assert!(!FmqType::is_compatible_element_type(&arena, iface));
        assert!(FmqType::new(&arena, "::parcel::fmq", "Descriptor", iface).is_err());
    }

    #[test]
    fn embedded_elements_are_rejected() {
        let mut arena = TypeArena::new();

        let s = arena.register(Box::new(StringType));
        assert!(!FmqType::is_compatible_element_type(&arena, s));

        let q = {
            let q = queue(&mut arena, ScalarKind::Uint8);
            arena.register(Box::new(q))
        };
        let holder = arena.register(Box::new(CompoundType::new(
            Style::Struct,
            "Holder",
            vec![CompoundField::new("queue", q)],
        )));
        assert!(!FmqType::is_compatible_element_type(&arena, holder));

        let err = FmqType::new(&arena, "::parcel::fmq", "Descriptor", holder).unwrap_err();
        assert!(matches!(err, EmitError::IncompatibleElementType(_)));
    }

    #[test]
    fn flat_compound_elements_are_compatible() {
        let mut arena = TypeArena::new();
        let x = arena.register(Box::new(ScalarType::new(ScalarKind::Int32)));
        let point = arena.register(Box::new(CompoundType::new(
            Style::Struct,
            "Point",
            vec![CompoundField::new("x", x)],
        )));
        assert!(FmqType::is_compatible_element_type(&arena, point));
    }

    #[test]
    fn root_transfer_always_runs_the_embedded_pass() {
        let mut arena = TypeArena::new();
        let q = queue(&mut arena, ScalarKind::Uint32);

        let mut out = Formatter::new();
        q.emit_reader_writer(
            &arena,
            &mut out,
            "obj",
            ParcelObj::pointer("parcel"),
            false,
            ErrorMode::Return,
        )
        .unwrap();
        let text = out.finish();

        assert!(text.contains("parcel->writeBuffer(&obj, sizeof(obj), &_pcl_obj_parent);"));
        assert!(text.contains("_pcl_err = ::parcel::fmq::writeEmbeddedToParcel("));
        assert!(text.contains("0 /* parentOffset */);"));
    }

    #[test]
    fn embedded_call_is_namespace_qualified() {
        let mut arena = TypeArena::new();
        let q = queue(&mut arena, ScalarKind::Uint8);

        let mut out = Formatter::new();
        q.emit_reader_writer_embedded(
            &arena,
            &mut out,
            "pixels",
            false,
            ParcelObj::reference("parcel"),
            true,
            ErrorMode::Goto,
            "parentHandle",
            "offsetof(Frame, pixels) + parentOffset",
        )
        .unwrap();
        let text = out.finish();

        assert!(text.contains("_pcl_err = ::parcel::fmq::readEmbeddedFromParcel("));
        assert!(text.contains(
            "const_cast<::parcel::fmq::Descriptor<uint8_t> &>(pixels),"
        ));
        assert!(text.contains("offsetof(Frame, pixels) + parentOffset);"));
        assert!(text.contains("goto _pcl_error;"));
    }
}
