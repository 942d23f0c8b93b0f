use crate::error::Result;
use crate::types::{GraphNode, KnowledgeGraph, NodeKind, RelationshipType};
use lore_protocol::path_filters::path_within;
use lore_protocol::{Component, DataFlow, DecisionRecord, TechDebtItem, ThreatFinding};

/// Everything the graph is built from. Missing parts are simply empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphInputs<'a> {
    pub records: &'a [DecisionRecord],
    pub components: &'a [Component],
    pub data_flows: &'a [DataFlow],
    pub findings: &'a [ThreatFinding],
    pub debt: &'a [TechDebtItem],
}

pub(crate) fn decision_node_id(id: &str) -> String {
    format!("decision:{id}")
}

pub(crate) fn threat_node_id(id: &str) -> String {
    format!("threat:{id}")
}

pub(crate) fn debt_node_id(id: &str) -> String {
    format!("debt:{id}")
}

/// Builds the knowledge graph. A relationship whose endpoint is unknown is dropped and
/// its node stays an orphan; two entities sharing a node id are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphGenerator;

impl GraphGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, inputs: GraphInputs<'_>) -> Result<KnowledgeGraph> {
        let mut graph = KnowledgeGraph::new();

        // Phase 1: one node per entity
        for component in inputs.components {
            let mut node = GraphNode::new(&component.id, NodeKind::Component, &component.name)
                .with("kind", component.kind.as_str());
            if !component.path.is_empty() {
                node = node.with("path", &component.path);
            }
            if let Some(topic) = &component.topic {
                node = node.with("topic", topic);
            }
            graph.add_node(node)?;
        }
        for record in inputs.records {
            let decision = &record.decision;
            let mut node = GraphNode::new(
                decision_node_id(&decision.id),
                NodeKind::Decision,
                &decision.title,
            )
            .with("source", decision.source.as_str())
            .with("confidence", format!("{:.2}", decision.confidence));
            if let Some(status) = &decision.status {
                node = node.with("status", status);
            }
            if let Some(supplement) = &record.supplement {
                node = node.with("enriched_by", &supplement.inferred_id);
            }
            graph.add_node(node)?;
        }
        for finding in inputs.findings {
            graph.add_node(
                GraphNode::new(threat_node_id(&finding.id), NodeKind::Threat, &finding.title)
                    .with("category", finding.category.as_str())
                    .with("severity", finding.severity.as_str())
                    .with("score", format!("{:.2}", finding.score))
                    .with("mitigation_status", finding.mitigation_status.as_str()),
            )?;
        }
        for item in inputs.debt {
            graph.add_node(
                GraphNode::new(debt_node_id(&item.id), NodeKind::Debt, &item.evidence_text)
                    .with("priority", item.priority.as_str())
                    .with("category", item.category.as_str())
                    .with("file", &item.file)
                    .with("line", item.line.to_string()),
            )?;
        }

        // Phase 2: relationships
        for record in inputs.records {
            self.link_decision(&mut graph, record, inputs.components);
        }
        for flow in inputs.data_flows {
            graph.add_edge(&flow.from, &flow.to, RelationshipType::RelatesTo);
        }
        for finding in inputs.findings {
            let threat = threat_node_id(&finding.id);
            graph.add_edge(&threat, &finding.component_id, RelationshipType::RelatesTo);
            if let Some(decision) = &finding.related_decision_id {
                graph.add_edge(
                    &threat,
                    &decision_node_id(decision),
                    RelationshipType::DerivedFrom,
                );
            }
            if let Some(decision) = &finding.mitigated_by {
                graph.add_edge(
                    &decision_node_id(decision),
                    &threat,
                    RelationshipType::Mitigates,
                );
            }
        }
        for item in inputs.debt {
            if let Some(component) = code_component_for(inputs.components, &item.file) {
                graph.add_edge(
                    &debt_node_id(&item.id),
                    &component.id,
                    RelationshipType::RelatesTo,
                );
            }
        }

        log::info!(
            "Knowledge graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    fn link_decision(
        &self,
        graph: &mut KnowledgeGraph,
        record: &DecisionRecord,
        components: &[Component],
    ) {
        let decision = &record.decision;
        let from = decision_node_id(&decision.id);

        for target in &decision.supersedes {
            graph.add_edge(&from, &decision_node_id(target), RelationshipType::Supersedes);
        }
        for newer in &decision.superseded_by {
            graph.add_edge(&decision_node_id(newer), &from, RelationshipType::Supersedes);
        }

        let supplement_evidence = record.supplement.iter().flat_map(|s| &s.evidence);
        for pointer in decision.evidence.iter().chain(supplement_evidence) {
            if let Some(component) = code_component_for(components, &pointer.file) {
                graph.add_edge(&from, &component.id, RelationshipType::RelatesTo);
            }
        }

        for component in components.iter().filter(|c| c.kind.is_external()) {
            let Some(topic) = component.topic.as_deref() else {
                continue;
            };
            let inferred_id = format!("INF-{topic}");
            let names_topic = decision.topic.as_deref() == Some(topic)
                || record
                    .supplement
                    .as_ref()
                    .is_some_and(|s| s.inferred_id == inferred_id);
            if names_topic {
                graph.add_edge(&from, &component.id, RelationshipType::RelatesTo);
            }
        }
    }
}

/// Innermost code component containing `file`. The root component only owns
/// top-level files.
fn code_component_for<'a>(components: &'a [Component], file: &str) -> Option<&'a Component> {
    components
        .iter()
        .filter(|c| !c.kind.is_external())
        .filter(|c| {
            if c.path.is_empty() || c.path == "." {
                !file.contains('/')
            } else {
                path_within(file, &c.path)
            }
        })
        .max_by_key(|c| c.path.len())
}
