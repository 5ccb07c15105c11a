//! Request-based tenant resolution strategies.
//!
//! A resolver derives a tenant name from request facts (host, headers, path);
//! it does not switch. Callers pass the resolved name to
//! [`TenancyScope::switch`](crate::TenancyScope::switch), typically from a
//! piece of middleware owned by whatever web framework hosts the application,
//! which is why resolution here works on a framework-neutral request
//! representation.

use crate::error::{TenancyError, TenancyResult};
use regex::Regex;
use std::collections::HashMap;

/// The request facts tenant resolution operates on.
///
/// Header names are stored lowercased, matching how HTTP/2-era stacks expose
/// them.
#[derive(Debug, Clone, Default)]
pub struct TenantRequest {
    host: Option<String>,
    path: String,
    headers: HashMap<String, String>,
}

impl TenantRequest {
    /// Create a request with the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the host (from the `Host` header or the URL authority).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// The request host, if known.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// A tenant-name resolution strategy.
pub trait TenantResolver: Send + Sync {
    /// Derive the tenant name for a request.
    fn resolve(&self, request: &TenantRequest) -> TenancyResult<String>;
}

/// Resolves the tenant from a request header (e.g. `X-Tenant`).
pub struct HeaderResolver {
    header_name: String,
}

impl HeaderResolver {
    /// Create a resolver reading the given header.
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
        }
    }
}

impl TenantResolver for HeaderResolver {
    fn resolve(&self, request: &TenantRequest) -> TenancyResult<String> {
        request
            .header(&self.header_name)
            .map(str::to_string)
            .ok_or_else(|| {
                TenancyError::ResolutionFailed(format!("missing header: {}", self.header_name))
            })
    }
}

/// Resolves the tenant from the subdomain under a base domain
/// (`acme.example.com` -> `acme`).
pub struct SubdomainResolver {
    base_domain: String,
    excluded: Vec<String>,
}

impl SubdomainResolver {
    /// Create a resolver for subdomains of `base_domain`.
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            excluded: Vec::new(),
        }
    }

    /// Exclude a subdomain from resolution (e.g. `www`), so requests to it
    /// fail resolution instead of being treated as a tenant.
    pub fn with_excluded_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.excluded.push(subdomain.into());
        self
    }

    fn extract_subdomain(&self, host: &str) -> Option<String> {
        // Remove port if present
        let host = host.split(':').next().unwrap_or(host);

        if let Some(subdomain) = host.strip_suffix(&format!(".{}", self.base_domain)) {
            if !subdomain.is_empty() && !subdomain.contains('.') {
                return Some(subdomain.to_string());
            }
        }

        None
    }
}

impl TenantResolver for SubdomainResolver {
    fn resolve(&self, request: &TenantRequest) -> TenancyResult<String> {
        let host = request
            .host()
            .ok_or_else(|| TenancyError::ResolutionFailed("missing host".to_string()))?;

        let subdomain = self.extract_subdomain(host).ok_or_else(|| {
            TenancyError::ResolutionFailed(format!("no subdomain in: {}", host))
        })?;

        if self.excluded.iter().any(|s| s == &subdomain) {
            return Err(TenancyError::ResolutionFailed(format!(
                "subdomain {} is excluded from resolution",
                subdomain
            )));
        }

        Ok(subdomain)
    }
}

/// Resolves the tenant from the full host name, port stripped
/// (`acme.example.com` stays `acme.example.com`).
pub struct HostResolver;

impl TenantResolver for HostResolver {
    fn resolve(&self, request: &TenantRequest) -> TenancyResult<String> {
        let host = request
            .host()
            .ok_or_else(|| TenancyError::ResolutionFailed("missing host".to_string()))?;
        let host = host.split(':').next().unwrap_or(host);
        if host.is_empty() {
            return Err(TenancyError::ResolutionFailed("empty host".to_string()));
        }
        Ok(host.to_string())
    }
}

/// Resolves the tenant from the URL path via a regex capture group
/// (e.g. `^/tenants/([^/]+)` on `/tenants/acme/users`).
pub struct PathResolver {
    pattern: Regex,
    group_index: usize,
}

impl PathResolver {
    /// Create a resolver matching `pattern` and extracting `group_index`.
    pub fn new(pattern: &str, group_index: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            group_index,
        })
    }
}

impl TenantResolver for PathResolver {
    fn resolve(&self, request: &TenantRequest) -> TenancyResult<String> {
        let captures = self.pattern.captures(request.path()).ok_or_else(|| {
            TenancyError::ResolutionFailed("path pattern not matched".to_string())
        })?;

        captures
            .get(self.group_index)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| TenancyError::ResolutionFailed("capture group not found".to_string()))
    }
}
