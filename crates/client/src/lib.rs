//! Request interception for havn.
//!
//! This crate classifies intercepted requests, runs the caching strategies
//! against the shared store, and drives the versioned install/activate
//! lifecycle. The server crate exposes it over MCP.

pub mod dispatch;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod request;

#[cfg(test)]
mod test_support;

pub use dispatch::{Matcher, Rule, RuleTable, Strategy};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, SharedTransport, Transport};
pub use intercept::Interceptor;
pub use lifecycle::{
    ControlSignal, LayerContext, LifecycleController, LifecycleState, Manifest, Registration, RegistrationStatus,
};
pub use request::{InterceptedRequest, InterceptedResponse, ResponseSource};
