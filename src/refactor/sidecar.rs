//! Key rewrites for sidecars and locks during a refactor
//!
//! Sidecars are keyed by fragment, locks by SURI. Both follow the same
//! prefix rule: a key equal to the old fragment, or starting with the old
//! fragment plus `.`, gets the new fragment in its place.

use crate::suri::Suri;
use std::collections::BTreeMap;
use tracing::debug;

/// Fragment of `fqn` within `module_fqn`; `None` when `fqn` is the module itself
pub fn fragment_of(fqn: &str, module_fqn: &str) -> Option<String> {
    fqn.strip_prefix(module_fqn)?
        .strip_prefix('.')
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Apply the prefix rule to a single fragment
pub fn rename_fragment(fragment: &str, old: &str, new: &str) -> Option<String> {
    if fragment == old {
        return Some(new.to_string());
    }
    fragment
        .strip_prefix(old)
        .filter(|rest| rest.starts_with('.'))
        .map(|rest| format!("{}{}", new, rest))
}

/// Rename fragment keys of a sidecar mapping
pub fn rename_fragment_keys<V: Clone>(
    doc: &BTreeMap<String, V>,
    old_fragment: &str,
    new_fragment: &str,
) -> BTreeMap<String, V> {
    doc.iter()
        .map(|(key, value)| {
            let key = rename_fragment(key, old_fragment, new_fragment).unwrap_or_else(|| key.clone());
            (key, value.clone())
        })
        .collect()
}

/// A change to SURI keys: a moved file, a renamed fragment, or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuriRewrite {
    pub old_path: String,
    pub new_path: Option<String>,
    /// `(old fragment, new fragment)`
    pub fragment: Option<(String, String)>,
}

impl SuriRewrite {
    pub fn move_file(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: Some(new_path.into()),
            fragment: None,
        }
    }

    pub fn rename(path: impl Into<String>, old_fragment: impl Into<String>, new_fragment: impl Into<String>) -> Self {
        Self {
            old_path: path.into(),
            new_path: None,
            fragment: Some((old_fragment.into(), new_fragment.into())),
        }
    }

    /// New form of a SURI key, or `None` if the rewrite does not touch it
    pub fn apply(&self, key: &str) -> Option<String> {
        let suri = Suri::parse(key).ok()?;
        if suri.path() != self.old_path {
            return None;
        }

        let mut out = suri.clone();
        if let Some(new_path) = &self.new_path {
            out = out.with_path(new_path).ok()?;
        }
        if let (Some((old, new)), Some(fragment)) = (&self.fragment, suri.fragment()) {
            if let Some(renamed) = rename_fragment(fragment, old, new) {
                out = out.with_fragment(Some(&renamed)).ok()?;
            }
        }

        (out != suri).then(|| out.to_string())
    }
}

/// Rewrite the SURI keys of a map; keys that are not SURIs are kept as they are
pub fn rewrite_suri_keys<V: Clone>(data: &BTreeMap<String, V>, rewrite: &SuriRewrite) -> BTreeMap<String, V> {
    let mut out = BTreeMap::new();
    for (key, value) in data {
        match rewrite.apply(key) {
            Some(new_key) => {
                debug!("rewriting {} -> {}", key, new_key);
                out.insert(new_key, value.clone());
            }
            None => {
                out.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    out
}

/// Split off the entries whose SURI path is `path` or lies under directory `path`
pub fn take_entries_under<V>(data: &mut BTreeMap<String, V>, path: &str, is_dir: bool) -> BTreeMap<String, V> {
    let dir_prefix = format!("{}/", path.trim_end_matches('/'));
    let keys: Vec<String> = data
        .keys()
        .filter(|key| {
            Suri::parse(key).is_ok_and(|suri| {
                if is_dir {
                    suri.path().starts_with(&dir_prefix)
                } else {
                    suri.path() == path
                }
            })
        })
        .cloned()
        .collect();

    keys.into_iter()
        .filter_map(|key| data.remove(&key).map(|value| (key, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_of() {
        assert_eq!(fragment_of("pkg.bus.MessageBus", "pkg.bus").as_deref(), Some("MessageBus"));
        assert_eq!(
            fragment_of("pkg.bus.MessageBus.info", "pkg.bus").as_deref(),
            Some("MessageBus.info")
        );
        assert_eq!(fragment_of("pkg.bus", "pkg.bus"), None);
        assert_eq!(fragment_of("pkg.busy.X", "pkg.bus"), None);
    }

    #[test]
    fn test_rename_fragment_keys_prefix_rule() {
        let mut doc = BTreeMap::new();
        doc.insert("MessageBus".to_string(), 1);
        doc.insert("MessageBus.info".to_string(), 2);
        doc.insert("MessageBusFactory".to_string(), 3);
        doc.insert("__doc__".to_string(), 4);

        let out = rename_fragment_keys(&doc, "MessageBus", "FeedbackBus");
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["FeedbackBus", "FeedbackBus.info", "MessageBusFactory", "__doc__"]
        );
        assert_eq!(out["FeedbackBus.info"], 2);
    }

    #[test]
    fn test_suri_rewrites() {
        let mut lock = BTreeMap::new();
        lock.insert("py://pkg/bus.py#MessageBus".to_string(), "a");
        lock.insert("py://pkg/bus.py#MessageBus.info".to_string(), "b");
        lock.insert("py://pkg/other.py#MessageBus".to_string(), "c");
        lock.insert("not a suri".to_string(), "d");

        let renamed = rewrite_suri_keys(&lock, &SuriRewrite::rename("pkg/bus.py", "MessageBus", "FeedbackBus"));
        assert!(renamed.contains_key("py://pkg/bus.py#FeedbackBus"));
        assert!(renamed.contains_key("py://pkg/bus.py#FeedbackBus.info"));
        assert!(renamed.contains_key("py://pkg/other.py#MessageBus"));
        assert!(renamed.contains_key("not a suri"));
        assert!(!renamed.contains_key("py://pkg/bus.py#MessageBus"));

        let moved = rewrite_suri_keys(&renamed, &SuriRewrite::move_file("pkg/bus.py", "pkg/transport.py"));
        assert_eq!(moved["py://pkg/transport.py#FeedbackBus"], "a");
        assert_eq!(moved.len(), 4);
    }

    #[test]
    fn test_take_entries_under() {
        let mut lock = BTreeMap::new();
        lock.insert("py://pkg/a.py#f".to_string(), 1);
        lock.insert("py://pkg/sub/b.py#g".to_string(), 2);
        lock.insert("py://pkg/subway.py#h".to_string(), 3);

        let taken = take_entries_under(&mut lock, "pkg/sub", true);
        assert_eq!(taken.len(), 1);
        assert!(taken.contains_key("py://pkg/sub/b.py#g"));

        let taken = take_entries_under(&mut lock, "pkg/a.py", false);
        assert_eq!(taken.len(), 1);
        assert_eq!(lock.len(), 1);
    }
}
