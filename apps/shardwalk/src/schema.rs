//! # LDBC SNB Schema
//!
//! Entity kinds, their id spaces and the relationship names used by the
//! social network workload.
//!
//! Vertices are named on the command line as `Label:local_id`, e.g.
//! `Person:42` or `Forum:7`.

use shardwalk_core::{EntityId, GraphError, VertexRef};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ENTITIES
// =============================================================================

/// Entity kinds of the social network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Person,
    Comment,
    Post,
    Forum,
    Tag,
    TagClass,
    Place,
    Organisation,
}

impl Entity {
    /// Every entity kind, in id-space order.
    pub const ALL: [Entity; 8] = [
        Entity::Person,
        Entity::Comment,
        Entity::Post,
        Entity::Forum,
        Entity::Tag,
        Entity::TagClass,
        Entity::Place,
        Entity::Organisation,
    ];

    /// Id space (upper half of the 128-bit id) of this kind.
    pub const fn id_space(self) -> u64 {
        match self {
            Self::Person => 1,
            Self::Comment => 2,
            Self::Post => 3,
            Self::Forum => 4,
            Self::Tag => 5,
            Self::TagClass => 6,
            Self::Place => 7,
            Self::Organisation => 8,
        }
    }

    /// Vertex label of this kind.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Comment => "Comment",
            Self::Post => "Post",
            Self::Forum => "Forum",
            Self::Tag => "Tag",
            Self::TagClass => "TagClass",
            Self::Place => "Place",
            Self::Organisation => "Organisation",
        }
    }

    /// Handle for the vertex with LDBC id `local` of this kind.
    pub fn vertex(self, local: u64) -> VertexRef {
        VertexRef::new(EntityId::new(self.id_space(), local), self.label())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Entity {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| GraphError::InvalidRequest(format!("unknown entity kind '{}'", s)))
    }
}

/// Parse `Label:local_id` into a vertex handle.
pub fn parse_vertex(s: &str) -> Result<VertexRef, GraphError> {
    let (kind, local) = s.split_once(':').ok_or_else(|| {
        GraphError::InvalidRequest(format!("expected 'Label:id', got '{}'", s))
    })?;
    let entity: Entity = kind.trim().parse()?;
    let local = local
        .trim()
        .parse::<u64>()
        .map_err(|e| GraphError::InvalidRequest(format!("bad id in '{}': {}", s, e)))?;
    Ok(entity.vertex(local))
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

pub const KNOWS: &str = "knows";
pub const HAS_CREATOR: &str = "hasCreator";
pub const HAS_MEMBER: &str = "hasMember";
pub const HAS_MODERATOR: &str = "hasModerator";
pub const CONTAINER_OF: &str = "containerOf";
pub const HAS_TAG: &str = "hasTag";
pub const HAS_INTEREST: &str = "hasInterest";
pub const HAS_TYPE: &str = "hasType";
pub const LIKES: &str = "likes";
pub const REPLY_OF: &str = "replyOf";
pub const IS_LOCATED_IN: &str = "isLocatedIn";
pub const IS_PART_OF: &str = "isPartOf";
pub const STUDY_AT: &str = "studyAt";
pub const WORK_AT: &str = "workAt";

// =============================================================================
// TESTS
// =============================================================================
