/*!

This library provides the untyped resource document the composition controller reconciles, the
definitions that describe how a resource kind maps onto an API, and the Kubernetes clients used
to read and persist managed objects.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use crd_ext::CrdExt;
pub use definition::{
    Action, AuthMethod, DefinitionResource, DefinitionSpec, ReferenceInfo, ResourceDescriptor,
    RestDefinition, VerbsDescription,
};
pub use document::ResourceDocument;
pub use error::{Error, Result};
pub use gvk::{parse_api_version, Gvk, Gvr};
pub use object_ref::ObjectRef;

pub mod clients;
pub mod condition;
pub mod constants;
mod crd_ext;
mod definition;
mod document;
mod error;
mod gvk;
mod object_ref;
pub mod text;
