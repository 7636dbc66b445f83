use crate::{Error, Result, session::decode_component};

/// Target of a proxied call after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpPath {
    /// Decoded, slash-collapsed form used for matching.
    pub route: String,
    /// Path sent upstream, with the caller's encoding preserved.
    pub upstream: String,
}

/// Deny-list of ERP endpoints that must never be reachable through the gateway.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    denied: Vec<String>,
}

impl PathPolicy {
    pub fn new<I, S>(denied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denied: denied
                .into_iter()
                .map(|fragment| fragment.as_ref().trim().to_ascii_lowercase())
                .filter(|fragment| !fragment.is_empty())
                .collect(),
        }
    }

    pub fn check(&self, raw_path: &str) -> Result<ErpPath> {
        let route = normalize(&fully_decode(raw_path))?;
        let upstream = normalize(raw_path)?;

        let lowered = route.to_ascii_lowercase();
        let raw_lowered = raw_path.to_ascii_lowercase();
        let denied = self.denied.iter().any(|fragment| {
            lowered.contains(fragment.as_str()) || raw_lowered.contains(fragment.as_str())
        });
        if denied {
            return Err(Error::Forbidden { path: route });
        }

        Ok(ErpPath { route, upstream })
    }
}

fn fully_decode(raw: &str) -> String {
    let mut current = raw.to_string();
    // Bounded so hostile inputs cannot spin.
    for _ in 0..3 {
        let next = decode_component(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => return Err(Error::bad_request("Relative path segments are not allowed")),
            _ => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return Err(Error::bad_request("Missing ERP endpoint path"));
    }
    Ok(format!("/{}", segments.join("/")))
}
