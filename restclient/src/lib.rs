/*!

Builds and executes HTTP calls from an OpenAPI description and a declarative resource descriptor.

A `ResourceDescriptor` maps each action on a resource (`create`, `get`, `findby`, ...) to an
operation of the API description. [`resolve_call`] looks the operation up, [`build_request`] sorts
the resource's fields into path parameters, query parameters and body fields, and a [`RestClient`]
sends the request to the description's server.

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

pub use call::{build_request, resolve_call, ApiCall, CallInfo, RequestConfiguration};
pub use error::{ApiError, Error, ErrorKind, Result};
pub use openapi::{ApiDescription, Method, Operation, Parameter, ParameterLocation};
pub use transport::RestClient;

mod call;
mod error;
pub mod openapi;
mod transport;
