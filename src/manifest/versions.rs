//! Target branch and version tag selection for templated manifests.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::section::{DEFAULT_KEY, VersionsConfig};

use super::ManifestError;

/// Branch used for `uri`: flag map entry, then config entry, then the
/// flag `default`, then the config `default`, then the repository's own
/// branch.
pub fn choose_target_branch(
    uri: &str,
    flags: &VersionsConfig,
    config: &VersionsConfig,
    repo_branch: &str,
) -> String {
    lookup(uri, &flags.default_branches, &config.default_branches)
        .cloned()
        .unwrap_or_else(|| repo_branch.to_string())
}

/// Number of versions to select for `uri`, with the same precedence as
/// [`choose_target_branch`] and `0` as the final fallback.
pub fn choose_n_versions(uri: &str, flags: &VersionsConfig, config: &VersionsConfig) -> i64 {
    lookup(uri, &flags.n_versions, &config.n_versions)
        .copied()
        .unwrap_or(0)
}

fn lookup<'a, V>(
    uri: &str,
    flags: &'a BTreeMap<String, V>,
    config: &'a BTreeMap<String, V>,
) -> Option<&'a V> {
    flags
        .get(uri)
        .or_else(|| config.get(uri))
        .or_else(|| flags.get(DEFAULT_KEY))
        .or_else(|| config.get(DEFAULT_KEY))
}

// ============================================================================
// Semantic versions
// ============================================================================

/// A leniently parsed version: optional `v`, one to three numeric
/// components, optional pre-release and build metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
    original: String,
}

impl Version {
    pub fn parse(tag: &str) -> Option<Self> {
        let trimmed = tag.trim();
        let rest = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let rest = rest.split_once('+').map_or(rest, |(v, _build)| v);
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre)),
            Some(_) => return None,
            None => (rest, None),
        };

        let mut numbers = [0u64; 3];
        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            *slot = part.parse().ok()?;
        }

        let pre = match pre {
            Some(pre) => {
                let ids: Vec<String> = pre.split('.').map(str::to_string).collect();
                if ids.iter().any(|id| id.is_empty()) {
                    return None;
                }
                ids
            }
            None => Vec::new(),
        };

        Some(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            original: tag.to_string(),
        })
    }

    /// The tag exactly as given.
    pub fn original(&self) -> &str {
        &self.original
    }

    fn floor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor,
            patch: 0,
            pre: Vec::new(),
            original: String::new(),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_pre(&self.pre, &other.pre))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A release sorts above any of its pre-releases; identifiers compare
/// numerically when both are numbers.
fn compare_pre(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    for (x, y) in a.iter().zip(b) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Highest tag of each of the `n` most recent `major.minor` lines.
pub fn last_n_versions(tags: &[String], n: i64) -> Result<Vec<String>, ManifestError> {
    let wanted = usize::try_from(n).map_err(|_| ManifestError::NegativeN)?;
    if wanted == 0 {
        return Ok(Vec::new());
    }
    if tags.is_empty() {
        return Err(ManifestError::NotEnoughVersions { wanted, actual: 0 });
    }

    let mut versions = tags
        .iter()
        .map(|tag| Version::parse(tag).ok_or_else(|| ManifestError::VersionParse(tag.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    versions.sort_by(|a, b| b.cmp(a));

    let mut selected = vec![versions[0].original().to_string()];
    let mut floor = versions[0].floor();
    for version in &versions[1..] {
        if selected.len() >= wanted {
            break;
        }
        if *version < floor {
            selected.push(version.original().to_string());
            floor = version.floor();
        }
    }

    if selected.len() < wanted {
        return Err(ManifestError::NotEnoughVersions {
            wanted,
            actual: selected.len(),
        });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_last_n_versions_one_per_minor() {
        let input = tags(&[
            "v1.2.3", "v1.2.8", "v1.1.5", "v1.1.0", "v1.1.3", "v2.0.1", "v2.0.8", "v2.1.0",
            "v2.0.6",
        ]);
        assert_eq!(
            last_n_versions(&input, 4).unwrap(),
            vec!["v2.1.0", "v2.0.8", "v1.2.8", "v1.1.5"]
        );
    }

    #[test]
    fn test_last_n_versions_short_tags() {
        let input = tags(&["v4.9", "v5.7", "v5.7.5", "v6.1", "v7.7"]);
        assert_eq!(
            last_n_versions(&input, 4).unwrap(),
            vec!["v7.7", "v6.1", "v5.7.5", "v4.9"]
        );
    }

    #[test]
    fn test_last_n_versions_boundaries() {
        assert!(last_n_versions(&[], 0).unwrap().is_empty());
        assert!(matches!(
            last_n_versions(&tags(&["v1.0.0"]), -1),
            Err(ManifestError::NegativeN)
        ));
        assert!(matches!(
            last_n_versions(&tags(&["v1.0.0", "v1.0.1"]), 2),
            Err(ManifestError::NotEnoughVersions { wanted: 2, actual: 1 })
        ));
        assert!(matches!(
            last_n_versions(&tags(&["v1.0.0", "latest"]), 1),
            Err(ManifestError::VersionParse(t)) if t == "latest"
        ));
    }

    #[test]
    fn test_version_ordering() {
        let rc = Version::parse("v1.2.0-rc.1").unwrap();
        let rel = Version::parse("1.2.0").unwrap();
        let beta = Version::parse("v1.2.0-beta").unwrap();
        assert!(rc < rel);
        assert!(beta > rc);
        assert_eq!(Version::parse("v2").unwrap().minor, 0);
        assert!(Version::parse("1.2.3.4").is_none());
        assert!(Version::parse("1.x").is_none());
    }

    #[test]
    fn test_choose_precedence() {
        let mut flags = VersionsConfig::default();
        let mut config = VersionsConfig::default();
        let uri = "https://github.com/org/repo/blob/DEFAULT_BRANCH/m.yaml";

        assert_eq!(choose_target_branch(uri, &flags, &config, "main"), "main");
        assert_eq!(choose_n_versions(uri, &flags, &config), 0);

        config.default_branches.insert("default".into(), "stable".into());
        assert_eq!(choose_target_branch(uri, &flags, &config, "main"), "stable");

        flags.default_branches.insert("default".into(), "dev".into());
        flags.n_versions.insert("default".into(), 1);
        assert_eq!(choose_target_branch(uri, &flags, &config, "main"), "dev");

        config.default_branches.insert(uri.into(), "release".into());
        config.n_versions.insert(uri.into(), 3);
        assert_eq!(choose_target_branch(uri, &flags, &config, "main"), "release");
        assert_eq!(choose_n_versions(uri, &flags, &config), 3);

        flags.default_branches.insert(uri.into(), "feature".into());
        assert_eq!(choose_target_branch(uri, &flags, &config, "main"), "feature");
    }
}
