//! Classification of `Concept/operation` paths.
//!
//! Included paths call the operation directly. Excluded paths are turned into
//! a `Requesting.request` and answered by synchronizations. Anything else is
//! unverified: callable directly, but flagged at startup so nobody exposes a
//! mutation by accident.

use concord_core::config::RoutesConfig;
use concord_core::ConceptRegistry;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::requesting::REQUESTING;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Included,
    Excluded,
    Unverified,
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Included => "included",
            Self::Excluded => "excluded",
            Self::Unverified => "unverified",
        };
        f.write_str(s)
    }
}

/// One line of the route listing.
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    pub path: String,
    pub kind: RouteKind,
    /// `false` for excluded paths served only by synchronizations.
    pub registered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    included: BTreeSet<String>,
    excluded: BTreeSet<String>,
}

impl RouteTable {
    pub fn from_config(routes: &RoutesConfig) -> Self {
        Self {
            included: routes.included.iter().map(|p| normalize(p)).collect(),
            excluded: routes.excluded.iter().map(|p| normalize(p)).collect(),
        }
    }

    /// Excluded wins when a path is listed in both.
    pub fn classify(&self, path: &str) -> RouteKind {
        let path = normalize(path);
        if self.excluded.contains(&path) {
            RouteKind::Excluded
        } else if self.included.contains(&path) {
            RouteKind::Included
        } else {
            RouteKind::Unverified
        }
    }

    /// Every registered operation plus every excluded path, sorted by path.
    /// `Requesting` is internal and never listed.
    pub fn listing(&self, registry: &ConceptRegistry) -> Vec<RouteEntry> {
        let registered: BTreeSet<String> = registry
            .paths()
            .into_iter()
            .filter(|(concept, _)| concept != REQUESTING)
            .map(|(concept, operation)| format!("{concept}/{operation}"))
            .collect();
        registered
            .iter()
            .chain(self.excluded.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|path| RouteEntry {
                path: path.clone(),
                kind: self.classify(path),
                registered: registered.contains(path),
            })
            .collect()
    }

    /// Report the classification at startup.
    pub fn log_summary(&self, registry: &ConceptRegistry) {
        let listing = self.listing(registry);
        for entry in &listing {
            match entry.kind {
                RouteKind::Unverified => {
                    tracing::warn!(path = %entry.path, "unverified route is callable directly")
                }
                kind => tracing::debug!(path = %entry.path, %kind, "route"),
            }
        }
        let count = |k: RouteKind| listing.iter().filter(|e| e.kind == k).count();
        tracing::info!(
            included = count(RouteKind::Included),
            excluded = count(RouteKind::Excluded),
            unverified = count(RouteKind::Unverified),
            "routes classified"
        );
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::Operation;

    fn table() -> RouteTable {
        RouteTable::from_config(&RoutesConfig {
            included: vec!["DesignPost/getPost".into(), "Both/op".into()],
            excluded: vec!["/DesignPost/createPost".into(), "Both/op".into()],
        })
    }

    #[test]
    fn classify_prefers_excluded() {
        let t = table();
        assert_eq!(t.classify("DesignPost/getPost"), RouteKind::Included);
        assert_eq!(t.classify("/DesignPost/createPost"), RouteKind::Excluded);
        assert_eq!(t.classify("Both/op"), RouteKind::Excluded);
        assert_eq!(t.classify("DesignPost/other"), RouteKind::Unverified);
    }

    #[test]
    fn listing_merges_registered_and_excluded_paths() {
        let mut registry = ConceptRegistry::new();
        let noop = |name: &str| Operation::raw(name, |input| async move { Ok(input) });
        registry
            .register_operations("DesignPost", vec![noop("getPost"), noop("other")])
            .unwrap();
        registry
            .register_operations(REQUESTING, vec![noop("request")])
            .unwrap();

        let listing = table().listing(&registry);
        let paths: Vec<&str> = listing.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["Both/op", "DesignPost/createPost", "DesignPost/getPost", "DesignPost/other"]
        );
        let create = &listing[1];
        assert_eq!(create.kind, RouteKind::Excluded);
        assert!(!create.registered);
        assert_eq!(listing[3].kind, RouteKind::Unverified);
    }
}
