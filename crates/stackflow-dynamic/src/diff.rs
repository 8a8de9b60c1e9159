//! Diff results and replacement policies

use crate::property::PropertyMap;
use serde::{Deserialize, Serialize};

/// Outcome of comparing old and new inputs of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Whether anything changed at all
    pub changes: bool,

    /// Changed keys that force a replacement
    #[serde(default)]
    pub replaces: Vec<String>,

    /// Keys known to never change
    #[serde(default)]
    pub stables: Vec<String>,

    /// Destroy the old instance before creating the new one
    #[serde(default)]
    pub delete_before_replace: bool,
}

impl DiffResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn requires_replacement(&self) -> bool {
        !self.replaces.is_empty()
    }

    /// How the engine is expected to act on this diff
    pub fn step(&self) -> StepKind {
        if !self.changes {
            StepKind::Same
        } else if self.replaces.is_empty() {
            StepKind::Update
        } else if self.delete_before_replace {
            StepKind::DeleteReplace
        } else {
            StepKind::Replace
        }
    }
}

/// Step the engine takes for a resource after a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// No changes needed
    Same,
    /// Update in place
    Update,
    /// Create the replacement, then delete the old instance
    Replace,
    /// Delete the old instance, then create the replacement
    DeleteReplace,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Same => write!(f, "same"),
            StepKind::Update => write!(f, "update"),
            StepKind::Replace => write!(f, "replace"),
            StepKind::DeleteReplace => write!(f, "delete-replace"),
        }
    }
}

/// Replacement policy applied by [`DiffPolicy::diff`]
///
/// Both variants set `delete_before_replace`: the resources these providers
/// manage (schemas, remote files) cannot coexist with their replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffPolicy {
    /// Only the listed critical keys force replacement; other changes update in place
    ReplaceOn {
        critical: Vec<String>,
        ignore: Vec<String>,
    },
    /// Any changed key forces replacement, except the ignored computed keys
    ReplaceAny { ignore: Vec<String> },
}

impl DiffPolicy {
    pub fn replace_on<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ReplaceOn {
            critical: keys.into_iter().map(Into::into).collect(),
            ignore: Vec::new(),
        }
    }

    pub fn replace_any() -> Self {
        Self::ReplaceAny { ignore: Vec::new() }
    }

    /// Skip computed keys (e.g. captured command output) when comparing
    pub fn ignoring<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra: Vec<String> = keys.into_iter().map(Into::into).collect();
        match self {
            Self::ReplaceOn {
                critical,
                mut ignore,
            } => {
                let critical = critical.into_iter().filter(|k| !extra.contains(k)).collect();
                ignore.extend(extra);
                Self::ReplaceOn { critical, ignore }
            }
            Self::ReplaceAny { mut ignore } => {
                ignore.extend(extra);
                Self::ReplaceAny { ignore }
            }
        }
    }

    /// Compare old and new inputs. Pure; no side effects.
    pub fn diff(&self, olds: &PropertyMap, news: &PropertyMap) -> DiffResult {
        match self {
            Self::ReplaceOn { critical, ignore } => {
                let changed = changed_keys(olds, news, ignore);
                let replaces = critical
                    .iter()
                    .filter(|k| changed.contains(k))
                    .cloned()
                    .collect();
                DiffResult {
                    changes: !changed.is_empty(),
                    replaces,
                    stables: Vec::new(),
                    delete_before_replace: true,
                }
            }
            Self::ReplaceAny { ignore } => {
                let changed = changed_keys(olds, news, ignore);
                DiffResult {
                    changes: !changed.is_empty(),
                    replaces: changed,
                    stables: Vec::new(),
                    delete_before_replace: true,
                }
            }
        }
    }
}

/// Keys whose values differ, including keys present on only one side
///
/// Keys of `olds` come first in map order, followed by keys only in `news`.
pub fn changed_keys(olds: &PropertyMap, news: &PropertyMap, ignore: &[String]) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, old) in olds.iter() {
        if ignore.contains(key) {
            continue;
        }
        if news.get(key) != Some(old) {
            changed.push(key.clone());
        }
    }

    for key in news.keys() {
        if !olds.contains_key(key) && !ignore.iter().any(|i| i == key) {
            changed.push(key.to_string());
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_inputs(script: &str) -> PropertyMap {
        PropertyMap::new()
            .with("server_address", "db.example.com")
            .with("database_name", "votes")
            .with("creation_script", script)
            .with("deletion_script", "DROP TABLE votesTable CASCADE")
            .with("creator_name", "admin")
    }

    fn schema_policy() -> DiffPolicy {
        DiffPolicy::replace_on(["server_address", "database_name", "creation_script"])
    }

    #[test]
    fn test_unchanged_inputs() {
        let olds = schema_inputs("CREATE TABLE t (id int)");
        let diff = schema_policy().diff(&olds, &olds.clone());

        assert!(!diff.changes);
        assert!(diff.replaces.is_empty());
        assert_eq!(diff.step(), StepKind::Same);
    }

    #[test]
    fn test_non_critical_change_updates_in_place() {
        let olds = schema_inputs("CREATE TABLE t (id int)");
        let news = olds.clone().with("creator_name", "operator");

        let diff = schema_policy().diff(&olds, &news);

        assert!(diff.changes);
        assert!(!diff.requires_replacement());
        assert_eq!(diff.step(), StepKind::Update);
    }

    #[test]
    fn test_critical_change_forces_delete_before_replace() {
        let olds = schema_inputs("CREATE TABLE t (id int)");
        let news = schema_inputs("CREATE TABLE t (id bigint)");

        let diff = schema_policy().diff(&olds, &news);

        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["creation_script".to_string()]);
        assert!(diff.delete_before_replace);
        assert_eq!(diff.step(), StepKind::DeleteReplace);
    }

    #[test]
    fn test_replaces_follow_declared_order() {
        let olds = schema_inputs("a");
        let news = schema_inputs("b")
            .with("server_address", "db2.example.com")
            .with("database_name", "ballots");

        let diff = schema_policy().diff(&olds, &news);
        assert_eq!(
            diff.replaces,
            vec!["server_address", "database_name", "creation_script"]
        );
    }

    #[test]
    fn test_replace_any_covers_added_and_removed_keys() {
        let olds = PropertyMap::new().with("src", "a.conf").with("dest", "a.conf");
        let news = PropertyMap::new().with("src", "a.conf").with("mode", "0644");

        let diff = DiffPolicy::replace_any().diff(&olds, &news);

        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["dest", "mode"]);
        assert!(diff.delete_before_replace);
    }

    #[test]
    fn test_replace_any_compares_nested_values_structurally() {
        let olds = PropertyMap::new().with("conn", json!({"host": "h", "port": 22}));
        let news = PropertyMap::new().with("conn", json!({"port": 22, "host": "h"}));

        let diff = DiffPolicy::replace_any().diff(&olds, &news);
        assert!(!diff.changes);
    }

    #[test]
    fn test_ignored_keys_do_not_trigger_replacement() {
        let olds = PropertyMap::new()
            .with("commands", json!(["cat myapp.conf"]))
            .with("results", json!([{"stdout": "x"}]));
        let news = PropertyMap::new().with("commands", json!(["cat myapp.conf"]));

        let diff = DiffPolicy::replace_any().ignoring(["results"]).diff(&olds, &news);
        assert_eq!(diff.step(), StepKind::Same);
    }

    #[test]
    fn test_ignored_keys_do_not_count_as_updates() {
        let policy = schema_policy().ignoring(["last_applied"]);
        let olds = schema_inputs("CREATE TABLE t (id int)").with("last_applied", "v1");
        let news = schema_inputs("CREATE TABLE t (id int)");

        let diff = policy.diff(&olds, &news);
        assert!(!diff.changes);
        assert_eq!(diff.step(), StepKind::Same);

        let renamed = news.with("creator_name", "operator");
        assert_eq!(policy.diff(&olds, &renamed).step(), StepKind::Update);
    }

    #[test]
    fn test_ignoring_a_critical_key_drops_it() {
        let policy = schema_policy().ignoring(["creation_script"]);
        let olds = schema_inputs("CREATE TABLE t (id int)");
        let news = schema_inputs("CREATE TABLE t (id bigint)");

        assert_eq!(policy.diff(&olds, &news).step(), StepKind::Same);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(StepKind::DeleteReplace.to_string(), "delete-replace");
        assert_eq!(StepKind::Same.to_string(), "same");
    }
}
