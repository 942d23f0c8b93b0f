//! Component detection and data-flow evidence.

use crate::error::{AnalysisError, Result};
use lore_decisions::catalogue::{self, TopicKind};
use lore_protocol::{Component, ComponentKind, DataFlow, Decision, EvidencePointer};
use lore_scanner::{FileRole, SourceSet};
use std::collections::BTreeMap;

pub const DEFAULT_DEPTH: usize = 2;

const ROOT_KEY: &str = ".";

const TEST_SEGMENTS: &[&str] = &[
    "test",
    "tests",
    "spec",
    "specs",
    "__tests__",
    "testdata",
    "fixtures",
    "e2e",
];

const DOC_SEGMENTS: &[&str] = &["doc", "docs", "documentation"];

const KIND_SEGMENTS: &[(ComponentKind, &[&str])] = &[
    (
        ComponentKind::Infrastructure,
        &[
            "infra",
            "infrastructure",
            "deploy",
            "deployment",
            "deployments",
            "terraform",
            "k8s",
            "kubernetes",
            "helm",
            "charts",
            "ops",
        ],
    ),
    (
        ComponentKind::Frontend,
        &["ui", "frontend", "web", "webapp", "client", "pages", "views"],
    ),
    (
        ComponentKind::Service,
        &[
            "api",
            "server",
            "http",
            "routes",
            "handlers",
            "controllers",
            "service",
            "services",
            "gateway",
        ],
    ),
    (ComponentKind::Cli, &["cli", "cmd", "bin", "commands"]),
    (
        ComponentKind::DatastoreAccess,
        &[
            "db",
            "database",
            "store",
            "storage",
            "repository",
            "repositories",
            "dao",
            "persistence",
            "migrations",
        ],
    ),
];

/// Directory group of a file: its first `depth` directory segments, `.` for root files.
pub(crate) fn directory_key(file_path: &str, depth: usize) -> String {
    let parts: Vec<&str> = file_path.split('/').collect();
    if parts.len() <= 1 {
        return ROOT_KEY.to_string();
    }
    let dir_parts = &parts[..parts.len() - 1];
    let depth = depth.min(dir_parts.len()).max(1);
    dir_parts[..depth].join("/")
}

pub(crate) fn is_test_path(rel_path: &str) -> bool {
    let lower = rel_path.to_ascii_lowercase();
    let mut segments = lower.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            let stem = segment.split('.').next().unwrap_or(segment);
            return stem.starts_with("test_")
                || stem.ends_with("_test")
                || stem.ends_with("_spec")
                || segment.contains(".test.")
                || segment.contains(".spec.")
                || (stem.ends_with("test") && segment.ends_with(".java"));
        }
        if TEST_SEGMENTS.contains(&segment) {
            return true;
        }
    }
    false
}

fn is_doc_path(rel_path: &str) -> bool {
    rel_path
        .to_ascii_lowercase()
        .split('/')
        .any(|segment| DOC_SEGMENTS.contains(&segment))
}

fn kind_for(key: &str) -> ComponentKind {
    let lower = key.to_ascii_lowercase();
    for segment in lower.split('/').rev() {
        for (kind, names) in KIND_SEGMENTS {
            if names.contains(&segment) {
                return *kind;
            }
        }
    }
    ComponentKind::Module
}

fn component_id(key: &str) -> String {
    if key == ROOT_KEY {
        "component:root".to_string()
    } else {
        format!("component:{key}")
    }
}

fn external_kind(kind: TopicKind) -> Option<ComponentKind> {
    match kind {
        TopicKind::Datastore | TopicKind::Cache => Some(ComponentKind::Datastore),
        TopicKind::Messaging => Some(ComponentKind::Messaging),
        _ => None,
    }
}

/// Components of one project, with the files that belong to each.
#[derive(Debug, Clone, Default)]
pub struct ComponentMap {
    pub components: Vec<Component>,
    pub data_flows: Vec<DataFlow>,
    members: BTreeMap<String, Vec<String>>,
    code_counts: BTreeMap<String, usize>,
    depth: usize,
}

impl ComponentMap {
    /// Files analysed for `component_id`: directory members for code components, topic
    /// evidence files for external ones.
    pub fn files_of(&self, component_id: &str) -> &[String] {
        self.members
            .get(component_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn code_file_count(&self, component_id: &str) -> usize {
        self.code_counts.get(component_id).copied().unwrap_or(0)
    }

    /// Code component containing `rel_path`, if any.
    pub fn component_for(&self, rel_path: &str) -> Option<&Component> {
        let id = component_id(&directory_key(rel_path, self.depth));
        self.components
            .iter()
            .find(|c| c.id == id && !c.kind.is_external())
    }

    pub fn get(&self, component_id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == component_id)
    }
}

/// Groups source directories into components.
#[derive(Debug, Clone, Copy)]
pub struct ComponentDetector {
    depth: usize,
}

impl Default for ComponentDetector {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
        }
    }
}

impl ComponentDetector {
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(AnalysisError::InvalidDepth);
        }
        Ok(Self { depth })
    }

    pub fn detect(&self, sources: &SourceSet, inferred: &[Decision]) -> ComponentMap {
        let mut groups: BTreeMap<String, (Vec<String>, usize, bool)> = BTreeMap::new();
        for file in sources.files() {
            if file.role == FileRole::Doc || is_test_path(&file.rel_path) || is_doc_path(&file.rel_path)
            {
                continue;
            }
            let key = directory_key(&file.rel_path, self.depth);
            let entry = groups.entry(key).or_default();
            entry.0.push(file.rel_path.clone());
            if file.role == FileRole::Code {
                entry.1 += 1;
            }
            if matches!(file.role, FileRole::Code | FileRole::Infra) {
                entry.2 = true;
            }
        }

        let mut map = ComponentMap {
            depth: self.depth,
            ..ComponentMap::default()
        };
        for (key, (files, code_files, has_code)) in groups {
            let kind = kind_for(&key);
            if !has_code && kind != ComponentKind::Infrastructure {
                continue;
            }
            let id = component_id(&key);
            map.components.push(Component {
                id: id.clone(),
                name: if key == ROOT_KEY { "root".to_string() } else { key.clone() },
                kind,
                path: key,
                file_count: files.len(),
                topic: None,
            });
            map.code_counts.insert(id.clone(), code_files);
            map.members.insert(id, files);
        }

        let mut flows = Vec::new();
        for decision in inferred {
            let Some(topic) = decision.topic.as_deref().and_then(catalogue::topic) else {
                continue;
            };
            let Some(kind) = external_kind(topic.kind) else {
                continue;
            };
            let id = format!("component:ext:{}", topic.key);
            let mut by_component: BTreeMap<String, Vec<EvidencePointer>> = BTreeMap::new();
            for pointer in &decision.evidence {
                if let Some(component) = map.component_for(&pointer.file) {
                    by_component
                        .entry(component.id.clone())
                        .or_default()
                        .push(pointer.clone());
                }
            }
            for (from, evidence) in by_component {
                flows.push(DataFlow {
                    from,
                    to: id.clone(),
                    evidence,
                });
            }
            let mut files: Vec<String> = decision.evidence.iter().map(|e| e.file.clone()).collect();
            files.dedup();
            map.components.push(Component {
                id: id.clone(),
                name: topic.label.to_string(),
                kind,
                path: String::new(),
                file_count: 0,
                topic: Some(topic.key.to_string()),
            });
            map.members.insert(id, files);
        }
        map.components.sort_by(|a, b| a.id.cmp(&b.id));
        flows.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        map.data_flows = flows;

        log::info!(
            "Detected {} components and {} data flows",
            map.components.len(),
            map.data_flows.len()
        );
        map
    }
}
