//! Domain name helpers for DNS-facing configuration

use crate::error::{ConfigError, Result};

/// A domain split into its first label and the zone it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    /// First label, empty for an apex domain
    pub subdomain: String,
    /// Parent zone; canonicalized with a trailing dot when a subdomain was split off
    pub parent: String,
}

/// Split a domain into subdomain and parent domain
///
/// `www.example.com` becomes (`www`, `example.com.`); an apex domain such as
/// `example.com` has an empty subdomain and is returned unchanged.
pub fn split_domain(domain: &str) -> Result<DomainParts> {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return Err(ConfigError::NoTopLevelDomain(domain.to_string()));
    }

    if parts.len() == 2 {
        return Ok(DomainParts {
            subdomain: String::new(),
            parent: domain.to_string(),
        });
    }

    Ok(DomainParts {
        subdomain: parts[0].to_string(),
        parent: format!("{}.", parts[1..].join(".")),
    })
}
