use crate::document::{EdgeRecord, GraphDocument, NodeRecord, GRAPH_DOCUMENT_VERSION};
use crate::error::{GraphError, Result};
use crate::types::{GraphNode, KnowledgeGraph, RelationshipType};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashSet, VecDeque};

impl KnowledgeGraph {
    /// Ids of nodes reached from `id` over outgoing edges of `relationship`
    pub fn outgoing(&self, id: &str, relationship: RelationshipType) -> Result<Vec<&str>> {
        self.neighbors(id, relationship, Direction::Outgoing)
    }

    /// Ids of nodes with an edge of `relationship` pointing at `id`
    pub fn incoming(&self, id: &str, relationship: RelationshipType) -> Result<Vec<&str>> {
        self.neighbors(id, relationship, Direction::Incoming)
    }

    fn neighbors(
        &self,
        id: &str,
        relationship: RelationshipType,
        direction: Direction,
    ) -> Result<Vec<&str>> {
        let idx = self
            .find_node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let mut ids: Vec<&str> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|e| e.weight().relationship == relationship)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph[other].id.as_str()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Nodes reachable from `id` within `max_depth` hops, ignoring edge direction.
    /// Returns `(node, distance)` sorted by distance then id.
    pub fn related_nodes(&self, id: &str, max_depth: usize) -> Result<Vec<(&GraphNode, usize)>> {
        let start = self
            .find_node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut result = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for next in self.graph.neighbors_undirected(current) {
                if visited.insert(next) {
                    result.push((&self.graph[next], depth + 1));
                    queue.push_back((next, depth + 1));
                }
            }
        }

        result.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        Ok(result)
    }

    /// Nodes without any incoming or outgoing edge, sorted by id
    #[must_use]
    pub fn orphans(&self) -> Vec<&GraphNode> {
        let mut orphans: Vec<&GraphNode> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_undirected(idx).next().is_none())
            .map(|idx| &self.graph[idx])
            .collect();
        orphans.sort_by(|a, b| a.id.cmp(&b.id));
        orphans
    }

    /// Serialisable snapshot with nodes sorted by id and edges by (from, to, relationship)
    #[must_use]
    pub fn to_document(&self) -> GraphDocument {
        let mut nodes: Vec<NodeRecord> = self
            .graph
            .node_weights()
            .map(|node| NodeRecord {
                id: node.id.clone(),
                kind: node.kind,
                label: node.label.clone(),
                attributes: node.attributes.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<EdgeRecord> = self
            .graph
            .edge_references()
            .map(|e| EdgeRecord {
                from: self.graph[e.source()].id.clone(),
                to: self.graph[e.target()].id.clone(),
                relationship: e.weight().relationship,
            })
            .collect();
        edges.sort_by(|a, b| {
            (&a.from, &a.to, a.relationship).cmp(&(&b.from, &b.to, b.relationship))
        });

        GraphDocument {
            version: GRAPH_DOCUMENT_VERSION,
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;
    use pretty_assertions::assert_eq;

    fn sample() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(GraphNode::new("decision:ADR-0001", NodeKind::Decision, "Use PostgreSQL")).unwrap();
        graph.add_node(GraphNode::new("component:src/db", NodeKind::Component, "src/db")).unwrap();
        graph.add_node(GraphNode::new("threat:THR-1", NodeKind::Threat, "SQL injection")).unwrap();
        graph.add_node(GraphNode::new("debt:DEBT-0001", NodeKind::Debt, "TODO")).unwrap();
        graph.add_edge("decision:ADR-0001", "component:src/db", RelationshipType::RelatesTo);
        graph.add_edge("threat:THR-1", "component:src/db", RelationshipType::RelatesTo);
        graph.add_edge("decision:ADR-0001", "threat:THR-1", RelationshipType::Mitigates);
        graph
    }

    #[test]
    fn directed_queries_filter_by_relationship() {
        let graph = sample();
        assert_eq!(
            graph
                .incoming("component:src/db", RelationshipType::RelatesTo)
                .unwrap(),
            vec!["decision:ADR-0001", "threat:THR-1"]
        );
        assert_eq!(
            graph
                .outgoing("decision:ADR-0001", RelationshipType::Mitigates)
                .unwrap(),
            vec!["threat:THR-1"]
        );
        assert!(graph
            .outgoing("threat:THR-1", RelationshipType::Mitigates)
            .unwrap()
            .is_empty());
        assert!(matches!(
            graph.outgoing("decision:nope", RelationshipType::RelatesTo),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn related_nodes_walks_both_directions() {
        let graph = sample();
        let related: Vec<(&str, usize)> = graph
            .related_nodes("component:src/db", 2)
            .unwrap()
            .into_iter()
            .map(|(node, depth)| (node.id.as_str(), depth))
            .collect();
        assert_eq!(
            related,
            vec![("decision:ADR-0001", 1), ("threat:THR-1", 1)]
        );
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let mut graph = sample();
        let err = graph
            .add_node(GraphNode::new("component:src/db", NodeKind::Component, "other"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(id) if id == "component:src/db"));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.get_node("component:src/db").unwrap().label, "src/db");
    }

    #[test]
    fn orphans_are_reported() {
        let graph = sample();
        let orphans: Vec<&str> = graph.orphans().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(orphans, vec!["debt:DEBT-0001"]);
    }

    #[test]
    fn snapshot_is_sorted() {
        let doc = sample().to_document();
        let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "component:src/db",
                "debt:DEBT-0001",
                "decision:ADR-0001",
                "threat:THR-1"
            ]
        );
        assert_eq!(doc.edges.len(), 3);
        assert_eq!(doc.edges[0].from, "decision:ADR-0001");
        assert_eq!(doc.edges[0].to, "component:src/db");
    }
}
