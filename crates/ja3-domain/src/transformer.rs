use crate::elements::{
    EdgeProperties, EntityProperties, GraphEdge, GraphElement, GraphEntity, TimeProperty,
    IS_EMITTING_GROUP, JA3_GROUP,
};

/// Earliest observation time of a group, or `None` for an empty group.
pub fn earliest_time(times: &[i64]) -> Option<i64> {
    times.iter().copied().min()
}

/// JA3 digest vertex, time property seeded with `time`.
pub fn build_entity(digest: &str, time: i64) -> GraphElement {
    GraphElement::Entity(GraphEntity {
        vertex: digest.to_string(),
        group: JA3_GROUP.to_string(),
        properties: EntityProperties {
            time: TimeProperty::hourly(time),
        },
    })
}

/// Directed device → digest edge. `count` is passed through as is; the graph
/// store validates it.
pub fn build_edge(source: &str, digest: &str, time: i64, count: i64) -> GraphElement {
    GraphElement::Edge(GraphEdge {
        group: IS_EMITTING_GROUP.to_string(),
        source: source.to_string(),
        destination: digest.to_string(),
        directed: true,
        properties: EdgeProperties {
            count,
            time: TimeProperty::hourly(time),
        },
    })
}
