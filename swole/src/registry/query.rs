//! Package lookup over the local and external indices.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use super::packages::{ExternalPackage, LocalPackage, Package, PackageKind};
use crate::package::{liberal_id, ContentPackage, PackageIdentifier, PackageVersion};

/// How a lookup matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// The name matched exactly.
    Exact,
    /// The name matched after normalization with [`liberal_id`].
    Liberal,
}

/// Which indices a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageFilter {
    Local,
    External,
    #[default]
    Any,
}

impl PackageFilter {
    fn includes(self, kind: PackageKind) -> bool {
        match self {
            PackageFilter::Any => true,
            PackageFilter::Local => kind == PackageKind::Local,
            PackageFilter::External => kind == PackageKind::External,
        }
    }
}

/// A borrowed indexed package of either kind.
#[derive(Debug, Clone, Copy)]
pub enum PackageRef<'a> {
    Local(&'a LocalPackage),
    External(&'a ExternalPackage),
}

impl<'a> PackageRef<'a> {
    fn as_package(&self) -> &'a dyn Package {
        match *self {
            PackageRef::Local(p) => p,
            PackageRef::External(p) => p,
        }
    }

    pub fn identifier(&self) -> Option<PackageIdentifier> {
        self.as_package().identifier()
    }

    pub fn content(&self) -> Option<Arc<ContentPackage>> {
        self.as_package().content()
    }

    pub fn location(&self) -> &'a Path {
        self.as_package().location()
    }

    pub fn kind(&self) -> PackageKind {
        self.as_package().kind()
    }

    /// Filter selecting only this package's index.
    pub fn kind_filter(&self) -> PackageFilter {
        match self.kind() {
            PackageKind::Local => PackageFilter::Local,
            PackageKind::External => PackageFilter::External,
        }
    }

    /// Identity string, marked when the package is embedded.
    pub fn display_name(&self) -> String {
        match *self {
            PackageRef::External(p) => p.display_name(),
            PackageRef::Local(p) => p
                .identifier()
                .map(|id| id.to_string())
                .unwrap_or_else(|| p.working_dir.display().to_string()),
        }
    }

    pub fn as_local(&self) -> Option<&'a LocalPackage> {
        match *self {
            PackageRef::Local(p) => Some(p),
            PackageRef::External(_) => None,
        }
    }

    pub fn as_external(&self) -> Option<&'a ExternalPackage> {
        match *self {
            PackageRef::External(p) => Some(p),
            PackageRef::Local(_) => None,
        }
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct PackageMatch<'a> {
    pub package: PackageRef<'a>,
    pub mode: MatchMode,
}

/// Every indexed package passing `filter`, local first, with its identity.
pub(crate) fn candidates<'a>(
    local: &'a [LocalPackage],
    external: &'a [ExternalPackage],
    filter: PackageFilter,
) -> Vec<(PackageRef<'a>, PackageIdentifier)> {
    let local = local.iter().map(PackageRef::Local);
    let external = external.iter().map(PackageRef::External);
    local
        .chain(external)
        .filter(|p| filter.includes(p.kind()))
        .filter_map(|p| p.identifier().map(|id| (p, id)))
        .collect()
}

/// Pick among `candidates` by name and optional version.
///
/// Exact names are tried first. Without a version the greatest version
/// wins, the earliest candidate on ties. With `liberal` a miss is retried
/// once with normalized names.
pub(crate) fn select<T: Copy>(
    candidates: &[(T, PackageIdentifier)],
    name: &str,
    version: Option<&PackageVersion>,
    liberal: bool,
) -> Option<(T, MatchMode)> {
    if let Some(found) = select_by(candidates, version, |n| n == name) {
        return Some((found, MatchMode::Exact));
    }
    if !liberal {
        return None;
    }
    let wanted = liberal_id(name);
    select_by(candidates, version, |n| liberal_id(n) == wanted).map(|found| (found, MatchMode::Liberal))
}

fn select_by<T: Copy>(
    candidates: &[(T, PackageIdentifier)],
    version: Option<&PackageVersion>,
    name_matches: impl Fn(&str) -> bool,
) -> Option<T> {
    let mut best: Option<&(T, PackageIdentifier)> = None;
    for candidate in candidates.iter().filter(|(_, id)| name_matches(&id.name)) {
        match version {
            Some(v) if &candidate.1.version == v => return Some(candidate.0),
            Some(_) => {}
            None => {
                let better = match best {
                    Some((_, b)) => candidate.1.version > b.version,
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
    }
    best.map(|(found, _)| *found)
}

/// Packages named `name` (liberally when asked), by identity descending.
pub(crate) fn list_by_name<T: Copy>(
    candidates: &[(T, PackageIdentifier)],
    name: &str,
    liberal: bool,
) -> Vec<(T, PackageIdentifier)> {
    let wanted = liberal_id(name);
    let mut found: Vec<_> = candidates
        .iter()
        .filter(|(_, id)| id.name == name || (liberal && liberal_id(&id.name) == wanted))
        .cloned()
        .collect();
    found.sort_by(|(_, a), (_, b)| descending(a, b));
    found
}

fn descending(a: &PackageIdentifier, b: &PackageIdentifier) -> Ordering {
    b.name.cmp(&a.name).then_with(|| b.version.cmp(&a.version))
}
