use reqwest::Url;
use std::collections::HashSet;
use tracing::warn;

/// Ports the API is usually served on, tried on the origin's host.
pub const SIBLING_PORTS: [u16; 2] = [8081, 8080];

pub const LOCAL_FALLBACKS: [&str; 4] = [
    "http://localhost:8081",
    "http://127.0.0.1:8081",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

/// Ordered, duplicate-free list of API base addresses.
///
/// The list is never empty: construction always appends the local
/// fallbacks. The only reordering is [`CandidateList::promote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    bases: Vec<String>,
}

impl CandidateList {
    /// Builds the list from the origin the client was started for (if any),
    /// followed by sibling ports on the same host and the local fallbacks.
    pub fn discover(origin: Option<&str>) -> Self {
        let mut bases = Vec::new();

        if let Some(origin) = origin.map(str::trim) {
            if origin.starts_with("http") {
                match Url::parse(origin) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {
                        bases.push(url.origin().ascii_serialization());
                        if let Some(host) = url.host_str() {
                            for port in SIBLING_PORTS {
                                bases.push(format!("{}://{}:{}", url.scheme(), host, port));
                            }
                        }
                    }
                    Ok(_) => bases.push(origin.to_string()),
                    Err(err) => {
                        warn!("unable to parse origin {origin}: {err}");
                        bases.push(origin.to_string());
                    }
                }
            }
        }

        bases.extend(LOCAL_FALLBACKS.iter().map(|base| base.to_string()));
        Self::dedup(bases)
    }

    /// Uses the given bases as-is (deduplicated). Falls back to the local
    /// addresses when nothing is given.
    pub fn from_bases<I, S>(bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bases: Vec<String> = bases.into_iter().map(Into::into).collect();
        if bases.is_empty() {
            return Self::discover(None);
        }
        Self::dedup(bases)
    }

    fn dedup(bases: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let bases = bases
            .into_iter()
            .filter(|base| seen.insert(base.clone()))
            .collect();
        Self { bases }
    }

    /// Moves the entry at `index` to the front, keeping the relative order
    /// of the others. Out-of-range indices and index 0 are no-ops.
    pub fn promote(&mut self, index: usize) {
        if index == 0 || index >= self.bases.len() {
            return;
        }
        let base = self.bases.remove(index);
        self.bases.insert(0, base);
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.bases.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.bases
    }
}
