//! Configuration gate: push delivery is enabled iff the host holds a non-empty
//! provider access token.

use std::fmt;

use crate::host::Host;

/// Provider access token. Never printed, so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Accept a provisioned token; blank tokens count as "not configured".
    pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
        let token = raw.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    /// Raw token, for the request header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Credential to use for this pass, if delivery is configured at all
pub fn configured_credential(host: &dyn Host) -> Option<Credential> {
    host.credential().and_then(Credential::parse)
}

pub fn is_configured(host: &dyn Host) -> bool {
    configured_credential(host).is_some()
}
