//! Host type translation
//!
//! Turns decoded wire graphs into host values and back. Host composites
//! are shared `Rc<RefCell<..>>` handles, so a graph that references one
//! node twice (or cyclically) produces one host instance reachable from
//! every referring slot.
//!
//! Instantiation goes through an explicit [`ClassRegistry`] and every
//! creation and assignment is checked by a
//! [`DeserializationValidator`](crate::validator::DeserializationValidator).

pub mod config;
pub mod decode;
pub mod encode;
pub mod host;
pub mod registry;
pub mod target;

pub use config::{TranslatorConfig, UnknownTypePolicy};
pub use decode::{RejectedAssignment, Translation, TypeTranslator};
pub use encode::HostEncoder;
pub use host::{
    AsObject, HostList, HostMap, HostObject, HostValue, RemoteClass, AS_OBJECT_TYPE, LIST_TYPE,
    MAP_TYPE,
};
pub use registry::ClassRegistry;
pub use target::TargetType;
