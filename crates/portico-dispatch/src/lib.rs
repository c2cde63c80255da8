//! Portico Request Dispatch
//!
//! Wraps every outbound API call:
//! - Resolves the request URL against the selected backend service
//! - Attaches `Authorization: Bearer` only when the trust policy allows it
//! - Negotiates JSON by default and encodes structured bodies
//! - Translates query keys for externally configured routes

mod config;
mod dispatcher;
mod error;
mod request;
mod resolve;
mod response;
mod route;
mod transport;

pub use config::{BackendConfig, QueryRename, ServiceConfig, ServiceSelection};
pub use dispatcher::Dispatcher;
pub use error::TransportError;
pub use request::{ApiRequest, PreparedRequest, RequestBody, ResponseType};
pub use resolve::{is_absolute_url, resolve_request_url};
pub use response::{Blob, BodyFuture, HttpResponse, Payload};
pub use route::translate_query;
pub use transport::{HttpTransport, ReqwestTransport};

pub use reqwest::header;
pub use reqwest::{Method, StatusCode};

pub type Result<T> = std::result::Result<T, TransportError>;
