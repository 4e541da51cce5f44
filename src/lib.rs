//! parcelgen: a marshalling-code generator for the parcel IPC transport
//!
//! Given typed interface descriptions, parcelgen emits the serialization
//! and deserialization code that moves structured values through a
//! length-prefixed, handle-addressed transport buffer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               parcelgen                 │
//! │                                         │
//! │  types   - type contract + emission     │
//! │  fmt     - indentation-aware output     │
//! │  driver  - name resolution + files      │
//! │                                         │
//! ├─────────────────────────────────────────┤
//! │   generated C++ against ::parcel        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## The embedded pass
//!
//! A compound value is transferred in two phases: one flat byte copy of the
//! whole value, then a follow-up pass over every field whose wire form is
//! not self-contained (a nested compound that itself needs the pass, a
//! queue descriptor, a string). Each such sub-region is addressed by its
//! parent's handle plus a byte offset, never by an absolute position, so
//! the whole structure relocates as one unit while every nested region can
//! still be bounds-checked independently.

pub mod driver;
pub mod fmt;
pub mod types;

pub use driver::{Coordinator, DriverError, Package};
pub use fmt::Formatter;
pub use types::compound::{CompoundField, CompoundType, Scope, Style};
pub use types::fmq::FmqType;
pub use types::leaf::{InterfaceType, ScalarKind, ScalarType, StringType};
pub use types::{EmitError, ErrorMode, ParcelObj, StorageMode, TargetType, Type, TypeArena, TypeId};
