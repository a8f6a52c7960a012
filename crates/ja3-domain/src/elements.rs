//! Graph mutation records in the graph store's element JSON format.
//!
//! An entity serializes as:
//!
//! ```json
//! {
//!     "class": "uk.gov.gchq.gaffer.data.element.Entity",
//!     "vertex": "<ja3digest>",
//!     "group": "ja3",
//!     "properties": {
//!         "time": {
//!             "uk.gov.gchq.gaffer.time.RBMBackedTimestampSet": {
//!                 "timeBucket": "HOUR",
//!                 "timestamps": [<epoch>]
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Edges add `source`, `destination`, `directed` and a `count` property.

use serde::Serialize;

pub const JA3_GROUP: &str = "ja3";
pub const IS_EMITTING_GROUP: &str = "isemitting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeBucket {
    Hour,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampSet {
    pub time_bucket: TimeBucket,
    pub timestamps: Vec<i64>,
}

/// Hour-bucketed timestamp set property, seeded with one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeProperty {
    #[serde(rename = "uk.gov.gchq.gaffer.time.RBMBackedTimestampSet")]
    pub set: TimestampSet,
}

impl TimeProperty {
    pub fn hourly(time: i64) -> Self {
        Self {
            set: TimestampSet {
                time_bucket: TimeBucket::Hour,
                timestamps: vec![time],
            },
        }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.set.timestamps
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityProperties {
    pub time: TimeProperty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeProperties {
    pub count: i64,
    pub time: TimeProperty,
}

/// A JA3 digest vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEntity {
    pub vertex: String,
    pub group: String,
    pub properties: EntityProperties,
}

/// A directed "device is emitting digest" relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub group: String,
    pub source: String,
    pub destination: String,
    pub directed: bool,
    pub properties: EdgeProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class")]
pub enum GraphElement {
    #[serde(rename = "uk.gov.gchq.gaffer.data.element.Entity")]
    Entity(GraphEntity),
    #[serde(rename = "uk.gov.gchq.gaffer.data.element.Edge")]
    Edge(GraphEdge),
}

impl GraphElement {
    pub fn as_entity(&self) -> Option<&GraphEntity> {
        match self {
            GraphElement::Entity(entity) => Some(entity),
            GraphElement::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&GraphEdge> {
        match self {
            GraphElement::Edge(edge) => Some(edge),
            GraphElement::Entity(_) => None,
        }
    }
}

/// Entity and edge records of one message, submitted as a single bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MutationBatch {
    pub elements: Vec<GraphElement>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: GraphElement) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GraphElement> {
        self.elements.iter()
    }
}
