//! Navigation tree built from `app.navigation/*` declarations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hub_extension_sdk::kinds::{HrefNavItem, NavSection};
use hub_extension_sdk::LoadedExtension;
use serde::Serialize;

use crate::store::narrow_all;

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavNode {
    Href {
        uid: String,
        id: String,
        title: String,
        href: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Section {
        uid: String,
        id: String,
        title: String,
        children: Vec<NavNode>,
    },
}

impl NavNode {
    pub fn id(&self) -> &str {
        match self {
            NavNode::Href { id, .. } | NavNode::Section { id, .. } => id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NavNode::Href { title, .. } | NavNode::Section { title, .. } => title,
        }
    }

    /// Child nodes; empty for links.
    pub fn children(&self) -> &[NavNode] {
        match self {
            NavNode::Href { .. } => &[],
            NavNode::Section { children, .. } => children,
        }
    }
}

enum EntryKind {
    Href { href: String, path: Option<String> },
    Section,
}

struct Entry {
    uid: String,
    id: String,
    title: String,
    parent: Option<String>,
    group: Option<String>,
    kind: EntryKind,
}

/// Build the navigation tree from active declarations.
///
/// Other tags are ignored, so the full active set can be passed in. Siblings
/// with a `group` come first, ordered by it; the rest keep registration
/// order. Sections without visible links are hidden. Entries naming an
/// unknown parent section are dropped.
pub fn build_navigation(extensions: &[Arc<LoadedExtension>]) -> Vec<NavNode> {
    let mut entries: Vec<(usize, Entry)> = Vec::new();

    for typed in narrow_all::<HrefNavItem>(extensions.iter().cloned()) {
        let uid = typed.uid().to_string();
        let index = position(extensions, &uid);
        let props = typed.properties;
        entries.push((
            index,
            Entry {
                uid,
                id: props.id,
                title: props.title,
                parent: props.section,
                group: props.group,
                kind: EntryKind::Href {
                    href: props.href,
                    path: props.path,
                },
            },
        ));
    }
    for typed in narrow_all::<NavSection>(extensions.iter().cloned()) {
        let uid = typed.uid().to_string();
        let index = position(extensions, &uid);
        let props = typed.properties;
        entries.push((
            index,
            Entry {
                uid,
                id: props.id,
                title: props.title,
                parent: props.section,
                group: props.group,
                kind: EntryKind::Section,
            },
        ));
    }

    // Registration order, then group order; the sort is stable.
    entries.sort_by_key(|(index, _)| *index);
    let mut entries: Vec<Entry> = entries.into_iter().map(|(_, entry)| entry).collect();
    entries.sort_by(|a, b| match (&a.group, &b.group) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let section_ids: HashSet<&str> = entries
        .iter()
        .filter(|e| matches!(e.kind, EntryKind::Section))
        .map(|e| e.id.as_str())
        .collect();

    let mut by_parent: HashMap<Option<&str>, Vec<&Entry>> = HashMap::new();
    for entry in &entries {
        match entry.parent.as_deref() {
            Some(parent) if !section_ids.contains(parent) => {
                tracing::warn!(
                    id = %entry.id,
                    section = parent,
                    "Dropping navigation entry with unknown section"
                );
            }
            parent => by_parent.entry(parent).or_default().push(entry),
        }
    }

    let mut expanded = HashSet::new();
    children_of(None, &by_parent, &mut expanded)
}

fn children_of<'a>(
    parent: Option<&'a str>,
    by_parent: &HashMap<Option<&'a str>, Vec<&'a Entry>>,
    expanded: &mut HashSet<&'a str>,
) -> Vec<NavNode> {
    let Some(entries) = by_parent.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for &entry in entries {
        match &entry.kind {
            EntryKind::Href { href, path } => nodes.push(NavNode::Href {
                uid: entry.uid.clone(),
                id: entry.id.clone(),
                title: entry.title.clone(),
                href: href.clone(),
                path: path.clone(),
            }),
            EntryKind::Section => {
                // A repeated section id is expanded only once.
                if !expanded.insert(entry.id.as_str()) {
                    continue;
                }
                let children = children_of(Some(entry.id.as_str()), by_parent, expanded);
                if children.is_empty() {
                    continue;
                }
                nodes.push(NavNode::Section {
                    uid: entry.uid.clone(),
                    id: entry.id.clone(),
                    title: entry.title.clone(),
                    children,
                });
            }
        }
    }
    nodes
}

fn position(extensions: &[Arc<LoadedExtension>], uid: &str) -> usize {
    extensions
        .iter()
        .position(|ext| ext.uid == uid)
        .unwrap_or(usize::MAX)
}
