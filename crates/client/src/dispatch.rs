//! Strategy selection for intercepted requests.
//!
//! Classification is a pure, ordered rule table: the first rule whose
//! matcher accepts the request decides the strategy. The table built from
//! configuration is:
//!
//! 1. any method other than GET → bypass
//! 2. extension schemes → bypass
//! 3. font-hosting domains → bypass
//! 4. API path prefix → network-first
//! 5. everything else → cache-first

use reqwest::Method;
use serde::Serialize;

use havn_core::AppConfig;

use crate::request::InterceptedRequest;

/// How the interceptor treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Not touched by the layer; goes straight to the network.
    Bypass,
    /// Serve from cache when present, otherwise fetch.
    CacheFirst,
    /// Fetch, falling back to cache when the network fails.
    NetworkFirst,
}

/// Predicate over a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Method differs from the given one.
    MethodNot(Method),
    /// URL scheme equals (case-insensitive).
    Scheme(String),
    /// URL host equals (case-insensitive).
    Host(String),
    /// http(s) URL whose path starts with the prefix.
    PathPrefix(String),
    Any,
}

impl Matcher {
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        match self {
            Matcher::MethodNot(method) => request.method != *method,
            Matcher::Scheme(scheme) => request.url.scheme().eq_ignore_ascii_case(scheme),
            Matcher::Host(host) => request
                .url
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(host)),
            Matcher::PathPrefix(prefix) => {
                matches!(request.url.scheme(), "http" | "https") && request.url.path().starts_with(prefix.as_str())
            }
            Matcher::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

impl Rule {
    pub fn new(matcher: Matcher, strategy: Strategy) -> Self {
        Self { matcher, strategy }
    }
}

/// Ordered rule table. Requests no rule matches are cache-first.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Build the standard table from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut rules = vec![Rule::new(Matcher::MethodNot(Method::GET), Strategy::Bypass)];
        rules.extend(
            config
                .extension_schemes
                .iter()
                .map(|scheme| Rule::new(Matcher::Scheme(scheme.clone()), Strategy::Bypass)),
        );
        rules.extend(
            config
                .bypass_domains
                .iter()
                .map(|domain| Rule::new(Matcher::Host(domain.clone()), Strategy::Bypass)),
        );
        rules.push(Rule::new(Matcher::PathPrefix(config.api_prefix.clone()), Strategy::NetworkFirst));
        rules.push(Rule::new(Matcher::Any, Strategy::CacheFirst));
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.strategy)
            .unwrap_or(Strategy::CacheFirst)
    }
}
