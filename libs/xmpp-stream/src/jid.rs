//! Jabber identifiers: `[local@]domain[/resource]`
use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Problems parsing a JID
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JidError {
    /// nothing before the `/` or after the `@`
    #[error("jid has an empty domain")]
    EmptyDomain,
    /// `@domain`
    #[error("jid has an empty local part")]
    EmptyLocal,
    /// `domain/`
    #[error("jid has an empty resource")]
    EmptyResource,
}

/// A full or bare JID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// local part, if any
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// domain part
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// resource part, if any
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// this JID with the resource dropped
    pub fn bare(&self) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    /// this JID with `resource` attached
    pub fn with_resource(&self, resource: impl Into<String>) -> Jid {
        Jid {
            resource: Some(resource.into()),
            ..self.bare()
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, resource) = match s.split_once('/') {
            Some((_, "")) => return Err(JidError::EmptyResource),
            Some((addr, resource)) => (addr, Some(resource.to_owned())),
            None => (s, None),
        };
        let (local, domain) = match addr.split_once('@') {
            Some(("", _)) => return Err(JidError::EmptyLocal),
            Some((local, domain)) => (Some(local.to_owned()), domain),
            None => (None, addr),
        };
        if domain.is_empty() {
            return Err(JidError::EmptyDomain);
        }
        Ok(Jid {
            local,
            domain: domain.to_ascii_lowercase(),
            resource,
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
