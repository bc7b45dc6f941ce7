//! EchoCheck client configuration options

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::store::TokenBackend;

/// Main options for the EchoCheck client
///
/// `base_url` is the only required field. Everything else falls back to a
/// sensible default: no timeout, the crate's User-Agent, and a file-backed
/// credential store under the platform config directory.
#[derive(Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientOptions"),
    builder_type(doc = "Builder for ClientOptions", vis = "pub"),
    build_method(doc = "Build the ClientOptions")
)]
pub struct ClientOptions {
    /// Base URL of the EchoCheck API (e.g. `https://echocheck.app/api`)
    #[builder(setter(into))]
    pub base_url: String,

    /// Per-request timeout applied to every call, the token refresh included
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,

    /// User-Agent header value
    #[builder(default, setter(strip_option, into))]
    pub user_agent: Option<String>,

    /// Path for the file-backed credential store
    ///
    /// Defaults to `credentials.json` under the platform config directory.
    /// Ignored when `storage` is set.
    #[builder(default, setter(strip_option, into))]
    pub credentials_path: Option<PathBuf>,

    /// Custom credential backend, e.g. an in-memory store for tests
    #[builder(default, setter(strip_option))]
    pub storage: Option<Arc<dyn TokenBackend>>,
}
