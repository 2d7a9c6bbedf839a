use serde::Serialize;

use crate::error::Result;
use crate::node::NodePath;
use crate::EntityId;

use super::NodeScorer;

/// One matching node with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMatch {
    pub entity: EntityId,
    pub node: NodePath,
    pub score: f32,
}

/// Drains `scorer`, entity by entity and node by node.
pub fn collect_matches(scorer: &mut dyn NodeScorer) -> Result<Vec<NodeMatch>> {
    let mut matches = Vec::new();
    while let Some(entity) = scorer.next_entity()? {
        while scorer.next_position()?.is_some() {
            matches.push(NodeMatch {
                entity,
                node: scorer.node()?.clone(),
                score: scorer.score()?,
            });
        }
    }
    Ok(matches)
}

/// Matching nodes grouped per entity, in entity order.
pub fn collect_nodes(scorer: &mut dyn NodeScorer) -> Result<Vec<(EntityId, Vec<NodePath>)>> {
    let mut out: Vec<(EntityId, Vec<NodePath>)> = Vec::new();
    for m in collect_matches(scorer)? {
        match out.last_mut() {
            Some((entity, nodes)) if *entity == m.entity => nodes.push(m.node),
            _ => out.push((m.entity, vec![m.node])),
        }
    }
    Ok(out)
}
