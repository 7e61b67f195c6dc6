//! # Query Compositions
//!
//! Social-network queries built from the engine primitives. Each
//! [`Operation`] is one unit of work run under the retry wrapper, so every
//! piece of per-query state (property bags, seen sets, top-k buffers) is
//! rebuilt inside the body on each attempt.
//!
//! | Operation          | Shape                                                     |
//! |--------------------|-----------------------------------------------------------|
//! | `friends`          | 3-level friend expansion, name match, profile lookups     |
//! | `recent-messages`  | friends -> messages, top-k by date, authors by inversion  |
//! | `forum-activity`   | forum joins filtered by date, posts counted per forum     |
//! | `friend-tags`      | friends -> posts -> tags fused into friends -> tags       |
//! | `shortest-path`    | bidirectional breadth-first search over `knows`           |
//! | `add-friendship`   | two `knows` edges written in one transaction              |

use crate::schema::{
    CONTAINER_OF, Entity, HAS_CREATOR, HAS_MEMBER, HAS_TAG, IS_LOCATED_IN, KNOWS, STUDY_AT,
    WORK_AT,
};
use clap::Subcommand;
use serde::Serialize;
use shardwalk_core::{
    Direction, Frontier, Graph, GraphError, KvStore, PropertyBag, PropertyKeys, PropertyMap,
    PropertyValue, TopK, Transaction, TraversalResult, VertexRef, fuse, intersect, remove_edge_if,
    subtract,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const PERSON: &str = Entity::Person.label();
const POST: &str = Entity::Post.label();
const COMMENT: &str = Entity::Comment.label();
const FORUM: &str = Entity::Forum.label();
const TAG: &str = Entity::Tag.label();
const PLACE: &str = Entity::Place.label();
const ORGANISATION: &str = Entity::Organisation.label();

/// Maximum friendship distance searched by `friends`.
const MAX_FRIEND_DISTANCE: u32 = 3;

// =============================================================================
// OPERATIONS
// =============================================================================

/// A query or update against the social graph.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Persons named `first_name` within three `knows` hops, closest first
    Friends {
        /// Start person id
        #[arg(short, long)]
        person: u64,

        /// First name to match
        #[arg(short, long)]
        first_name: String,

        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Latest messages written by direct friends up to a date
    RecentMessages {
        /// Start person id
        #[arg(short, long)]
        person: u64,

        /// Inclusive upper bound on creationDate (epoch millis)
        #[arg(short, long)]
        max_date: i64,

        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Forums that friends joined after a date, ranked by their posts there
    ForumActivity {
        /// Start person id
        #[arg(short, long)]
        person: u64,

        /// Exclusive lower bound on joinDate (epoch millis)
        #[arg(short, long)]
        min_date: i64,

        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Tags used by friends and friends of friends, ranked by how many of them used each
    FriendTags {
        /// Start person id
        #[arg(short, long)]
        person: u64,

        /// Maximum rows
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Length of the shortest `knows` path between two persons
    ShortestPath {
        /// First person id
        #[arg(short, long)]
        from: u64,

        /// Second person id
        #[arg(short, long)]
        to: u64,
    },

    /// Make two persons friends
    AddFriendship {
        /// First person id
        #[arg(short = 'a', long)]
        person1: u64,

        /// Second person id
        #[arg(short = 'b', long)]
        person2: u64,

        /// creationDate of the friendship (epoch millis)
        #[arg(short, long)]
        creation_date: i64,
    },
}

impl Operation {
    /// Short name used in logs and bench reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Friends { .. } => "friends",
            Self::RecentMessages { .. } => "recent-messages",
            Self::ForumActivity { .. } => "forum-activity",
            Self::FriendTags { .. } => "friend-tags",
            Self::ShortestPath { .. } => "shortest-path",
            Self::AddFriendship { .. } => "add-friendship",
        }
    }

    /// Whether the operation writes.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::AddFriendship { .. })
    }

    /// Run the operation to completion, retrying on conflicts.
    pub fn execute<S: KvStore>(&self, graph: &Graph<S>) -> Result<OperationOutput, GraphError> {
        tracing::debug!(operation = self.name(), "executing");
        match self {
            Self::Friends {
                person,
                first_name,
                limit,
            } => friends(graph, *person, first_name, *limit).map(OperationOutput::Friends),
            Self::RecentMessages {
                person,
                max_date,
                limit,
            } => recent_messages(graph, *person, *max_date, *limit)
                .map(OperationOutput::RecentMessages),
            Self::ForumActivity {
                person,
                min_date,
                limit,
            } => forum_activity(graph, *person, *min_date, *limit)
                .map(OperationOutput::ForumActivity),
            Self::FriendTags { person, limit } => {
                friend_tags(graph, *person, *limit).map(OperationOutput::FriendTags)
            }
            Self::ShortestPath { from, to } => {
                shortest_path(graph, *from, *to).map(OperationOutput::ShortestPath)
            }
            Self::AddFriendship {
                person1,
                person2,
                creation_date,
            } => add_friendship(graph, *person1, *person2, *creation_date)
                .map(|edges| OperationOutput::AddFriendship { edges }),
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Result of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "operation", content = "result")]
pub enum OperationOutput {
    Friends(Vec<FriendRow>),
    RecentMessages(Vec<MessageRow>),
    ForumActivity(Vec<ForumRow>),
    FriendTags(Vec<TagRow>),
    /// `None` when the persons are not connected.
    ShortestPath(Option<u32>),
    AddFriendship { edges: usize },
}

impl OperationOutput {
    /// Number of rows (1 for scalar results).
    pub fn row_count(&self) -> usize {
        match self {
            Self::Friends(rows) => rows.len(),
            Self::RecentMessages(rows) => rows.len(),
            Self::ForumActivity(rows) => rows.len(),
            Self::FriendTags(rows) => rows.len(),
            Self::ShortestPath(_) | Self::AddFriendship { .. } => 1,
        }
    }

    /// Human-readable lines, one per row.
    pub fn lines(&self) -> Vec<String> {
        fn each<T: fmt::Display>(rows: &[T]) -> Vec<String> {
            rows.iter().map(ToString::to_string).collect()
        }
        match self {
            Self::Friends(rows) => each(rows),
            Self::RecentMessages(rows) => each(rows),
            Self::ForumActivity(rows) => each(rows),
            Self::FriendTags(rows) => each(rows),
            Self::ShortestPath(Some(length)) => vec![format!("path length: {}", length)],
            Self::ShortestPath(None) => vec!["no path".to_string()],
            Self::AddFriendship { edges } => vec![format!("{} edges written", edges)],
        }
    }
}

/// A university or company a person is affiliated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affiliation {
    pub name: String,
    /// classYear for universities, workFrom for companies.
    pub year: i64,
    pub place: String,
}

/// One `friends` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FriendRow {
    pub id: u64,
    pub last_name: String,
    pub distance: u32,
    pub birthday: Option<i64>,
    pub creation_date: Option<i64>,
    pub gender: Option<String>,
    pub browser_used: Option<String>,
    pub location_ip: Option<String>,
    pub emails: Vec<String>,
    pub languages: Vec<String>,
    pub city: Option<String>,
    pub universities: Vec<Affiliation>,
    pub companies: Vec<Affiliation>,
}

impl fmt::Display for FriendRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}  Person:{:<8} {:<16} {}",
            self.distance,
            self.id,
            self.last_name,
            self.city.as_deref().unwrap_or("-")
        )
    }
}

/// One `recent-messages` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRow {
    pub person_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub message_id: u64,
    pub content: String,
    pub creation_date: i64,
}

impl fmt::Display for MessageRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>14}  {} {} (Person:{}): {}",
            self.creation_date, self.first_name, self.last_name, self.person_id, self.content
        )
    }
}

/// One `forum-activity` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForumRow {
    pub forum_id: u64,
    pub title: String,
    pub post_count: usize,
}

impl fmt::Display for ForumRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  Forum:{:<8} {}",
            self.post_count, self.forum_id, self.title
        )
    }
}

/// One `friend-tags` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRow {
    pub tag_id: u64,
    pub name: String,
    pub friend_count: usize,
}

impl fmt::Display for TagRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {}", self.friend_count, self.name)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn owned_str(bag: &PropertyBag, vertex: &VertexRef, key: &str) -> String {
    bag.str(vertex, key).unwrap_or_default().to_string()
}

fn opt_str(bag: &PropertyBag, vertex: &VertexRef, key: &str) -> Option<String> {
    bag.str(vertex, key).map(str::to_string)
}

fn list(bag: &PropertyBag, vertex: &VertexRef, key: &str) -> Vec<String> {
    bag.value(vertex, key)
        .and_then(PropertyValue::as_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

fn edge_int(props: &PropertyMap, key: &str) -> Option<i64> {
    props.get(key).and_then(PropertyValue::as_int)
}

/// Persons one and two `knows` hops away, without `start`.
fn friends_within_two<S: KvStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    start: &VertexRef,
) -> Result<BTreeSet<VertexRef>, GraphError> {
    let first = tx.traverse(start, KNOWS, Direction::Out, false, &[PERSON])?;
    let second = tx.traverse(&first, KNOWS, Direction::Out, false, &[PERSON])?;
    let mut friends: BTreeSet<VertexRef> = first.v_set().clone();
    friends.extend(second.v_set().iter().cloned());
    friends.remove(start);
    Ok(friends)
}

fn affiliations(
    edges: &TraversalResult,
    places: &TraversalResult,
    bag: &PropertyBag,
    person: &VertexRef,
    year_key: &str,
) -> Vec<Affiliation> {
    let props = edges.edge_properties(person).unwrap_or_default();
    edges
        .neighbors(person)
        .iter()
        .enumerate()
        .map(|(idx, org)| Affiliation {
            name: owned_str(bag, org, "name"),
            year: props
                .get(idx)
                .and_then(|p| edge_int(p, year_key))
                .unwrap_or_default(),
            place: places
                .neighbors(org)
                .first()
                .map(|place| owned_str(bag, place, "name"))
                .unwrap_or_default(),
        })
        .collect()
}

// =============================================================================
// FRIENDS
// =============================================================================

fn friends<S: KvStore>(
    graph: &Graph<S>,
    person: u64,
    first_name: &str,
    limit: usize,
) -> Result<Vec<FriendRow>, GraphError> {
    let start = Entity::Person.vertex(person);
    let name_keys = PropertyKeys::named(["firstName", "lastName"]);

    graph.read_with_retry(|tx| {
        let mut bag = PropertyBag::new();
        let mut seen = BTreeSet::from([start.clone()]);
        let mut level = TraversalResult::from_set(seen.clone());
        let mut top = TopK::new(limit, |a: &(u32, String, VertexRef), b: &(u32, String, VertexRef)| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.local_id().cmp(&b.2.local_id()))
        });

        // Distance ranks first, so a full buffer can't be improved further out.
        for distance in 1..=MAX_FRIEND_DISTANCE {
            if top.is_full() {
                break;
            }
            let mut next = tx.traverse(&level, KNOWS, Direction::Out, false, &[PERSON])?;
            subtract(&mut next, &seen);
            if next.is_empty() {
                break;
            }

            tx.get_properties(&mut bag, &next, &name_keys)?;
            for candidate in next.v_set() {
                if bag.str(candidate, "firstName") == Some(first_name) {
                    top.push((
                        distance,
                        owned_str(&bag, candidate, "lastName"),
                        candidate.clone(),
                    ));
                }
            }

            seen.extend(next.v_set().iter().cloned());
            level = TraversalResult::from_set(next.v_set().clone());
        }

        let matches = top.into_sorted_vec();
        let persons: Vec<VertexRef> = matches.iter().map(|m| m.2.clone()).collect();

        let cities = tx.traverse(&persons, IS_LOCATED_IN, Direction::Out, false, &[PLACE])?;
        let studies = tx.traverse(&persons, STUDY_AT, Direction::Out, true, &[ORGANISATION])?;
        let works = tx.traverse(&persons, WORK_AT, Direction::Out, true, &[ORGANISATION])?;
        let organisations: [&dyn Frontier; 2] = [&studies, &works];
        let org_places =
            tx.traverse(&organisations, IS_LOCATED_IN, Direction::Out, false, &[PLACE])?;

        let everything: [&dyn Frontier; 5] = [&persons, &cities, &studies, &works, &org_places];
        tx.get_properties(&mut bag, &everything, &PropertyKeys::All)?;

        Ok(matches
            .into_iter()
            .map(|(distance, last_name, friend)| FriendRow {
                id: friend.local_id(),
                last_name,
                distance,
                birthday: bag.int(&friend, "birthday"),
                creation_date: bag.int(&friend, "creationDate"),
                gender: opt_str(&bag, &friend, "gender"),
                browser_used: opt_str(&bag, &friend, "browserUsed"),
                location_ip: opt_str(&bag, &friend, "locationIP"),
                emails: list(&bag, &friend, "email"),
                languages: list(&bag, &friend, "speaks"),
                city: cities
                    .neighbors(&friend)
                    .first()
                    .and_then(|city| opt_str(&bag, city, "name")),
                universities: affiliations(&studies, &org_places, &bag, &friend, "classYear"),
                companies: affiliations(&works, &org_places, &bag, &friend, "workFrom"),
            })
            .collect())
    })
}

// =============================================================================
// RECENT MESSAGES
// =============================================================================

fn recent_messages<S: KvStore>(
    graph: &Graph<S>,
    person: u64,
    max_date: i64,
    limit: usize,
) -> Result<Vec<MessageRow>, GraphError> {
    let start = Entity::Person.vertex(person);
    let message_keys = PropertyKeys::named(["creationDate", "content", "imageFile"]);
    let author_keys = PropertyKeys::named(["firstName", "lastName"]);

    graph.read_with_retry(|tx| {
        let friends = tx.traverse(&start, KNOWS, Direction::Out, false, &[PERSON])?;
        let written = tx.traverse(&friends, HAS_CREATOR, Direction::In, false, &[POST, COMMENT])?;

        let mut bag = PropertyBag::new();
        tx.get_properties(&mut bag, &written, &message_keys)?;

        // Newest first, then message id ascending.
        let mut top = TopK::new(limit, |a: &(i64, VertexRef), b: &(i64, VertexRef)| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.local_id().cmp(&b.1.local_id()))
        });
        for message in written.v_set() {
            match bag.int(message, "creationDate") {
                Some(date) if date <= max_date => {
                    top.push((date, message.clone()));
                }
                _ => {}
            }
        }

        let authors = written.invert();
        tx.get_properties(&mut bag, &authors, &author_keys)?;

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .filter_map(|(creation_date, message)| {
                let author = authors.neighbors(&message).first()?;
                let content = match bag.str(&message, "content") {
                    Some(text) if !text.is_empty() => text.to_string(),
                    _ => owned_str(&bag, &message, "imageFile"),
                };
                Some(MessageRow {
                    person_id: author.local_id(),
                    first_name: owned_str(&bag, author, "firstName"),
                    last_name: owned_str(&bag, author, "lastName"),
                    message_id: message.local_id(),
                    content,
                    creation_date,
                })
            })
            .collect())
    })
}

// =============================================================================
// FORUM ACTIVITY
// =============================================================================

fn forum_activity<S: KvStore>(
    graph: &Graph<S>,
    person: u64,
    min_date: i64,
    limit: usize,
) -> Result<Vec<ForumRow>, GraphError> {
    let start = Entity::Person.vertex(person);
    let title_keys = PropertyKeys::named(["title"]);

    graph.read_with_retry(|tx| {
        let friends = friends_within_two(tx, &start)?;

        let mut friend_forums = tx.traverse(&friends, HAS_MEMBER, Direction::In, true, &[FORUM])?;
        remove_edge_if(&mut friend_forums, |_, props| {
            edge_int(props, "joinDate").is_none_or(|joined| joined <= min_date)
        });
        let forum_friends = friend_forums.invert();

        let active: Vec<VertexRef> = friend_forums.sources().cloned().collect();
        let friend_posts = tx.traverse(&active, HAS_CREATOR, Direction::In, false, &[POST])?;
        let post_authors = friend_posts.invert();
        let forum_posts =
            tx.traverse(&friend_forums, CONTAINER_OF, Direction::Out, false, &[POST])?;

        let mut counts: BTreeMap<VertexRef, usize> = BTreeMap::new();
        for forum in friend_forums.v_set() {
            let members = forum_friends.neighbors(forum);
            let count = forum_posts
                .neighbors(forum)
                .iter()
                .filter(|post| {
                    post_authors
                        .neighbors(post)
                        .first()
                        .is_some_and(|author| members.contains(author))
                })
                .count();
            counts.insert(forum.clone(), count);
        }

        let mut top = TopK::new(limit, |a: &(usize, VertexRef), b: &(usize, VertexRef)| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.local_id().cmp(&b.1.local_id()))
        });
        top.extend(counts.into_iter().map(|(forum, count)| (count, forum)));
        let ranked = top.into_sorted_vec();

        let forums: Vec<VertexRef> = ranked.iter().map(|r| r.1.clone()).collect();
        let mut bag = PropertyBag::new();
        tx.get_properties(&mut bag, &forums, &title_keys)?;

        Ok(ranked
            .into_iter()
            .map(|(post_count, forum)| ForumRow {
                forum_id: forum.local_id(),
                title: owned_str(&bag, &forum, "title"),
                post_count,
            })
            .collect())
    })
}

// =============================================================================
// FRIEND TAGS
// =============================================================================

fn friend_tags<S: KvStore>(
    graph: &Graph<S>,
    person: u64,
    limit: usize,
) -> Result<Vec<TagRow>, GraphError> {
    let start = Entity::Person.vertex(person);
    let name_keys = PropertyKeys::named(["name"]);

    graph.read_with_retry(|tx| {
        let friends = friends_within_two(tx, &start)?;
        let posts = tx.traverse(&friends, HAS_CREATOR, Direction::In, false, &[POST])?;
        let tags = tx.traverse(&posts, HAS_TAG, Direction::Out, false, &[TAG])?;

        // friend -> distinct tags, then tag -> friends who used it
        let tag_users = fuse(&posts, &tags, false).invert();

        let mut bag = PropertyBag::new();
        tx.get_properties(&mut bag, &tags, &name_keys)?;

        let mut top = TopK::new(limit, |a: &TagRow, b: &TagRow| {
            b.friend_count
                .cmp(&a.friend_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        top.extend(tag_users.sources().map(|tag| TagRow {
            tag_id: tag.local_id(),
            name: owned_str(&bag, tag, "name"),
            friend_count: tag_users.neighbors(tag).len(),
        }));
        Ok(top.into_sorted_vec())
    })
}

// =============================================================================
// SHORTEST PATH
// =============================================================================

fn shortest_path<S: KvStore>(
    graph: &Graph<S>,
    from: u64,
    to: u64,
) -> Result<Option<u32>, GraphError> {
    if from == to {
        return Ok(Some(0));
    }
    let source = Entity::Person.vertex(from);
    let target = Entity::Person.vertex(to);

    graph.read_with_retry(|tx| {
        let mut near = TraversalResult::from_set(BTreeSet::from([source.clone()]));
        let mut far = TraversalResult::from_set(BTreeSet::from([target.clone()]));
        let mut near_seen = near.v_set().clone();
        let mut far_seen = far.v_set().clone();
        let mut length = 1;

        // Alternate sides; every round either meets, dead-ends or grows a
        // seen set, so the loop ends on a finite graph.
        loop {
            let mut next = tx.traverse(&near, KNOWS, Direction::Out, false, &[PERSON])?;
            subtract(&mut next, &near_seen);
            if next.is_empty() {
                return Ok(None);
            }
            if meets(&next, &far) {
                return Ok(Some(length));
            }
            near_seen.extend(next.v_set().iter().cloned());
            near = next;
            length += 1;

            let mut next = tx.traverse(&far, KNOWS, Direction::Out, false, &[PERSON])?;
            subtract(&mut next, &far_seen);
            if next.is_empty() {
                return Ok(None);
            }
            if meets(&next, &near) {
                return Ok(Some(length));
            }
            far_seen.extend(next.v_set().iter().cloned());
            far = next;
            length += 1;
        }
    })
}

fn meets(expanded: &TraversalResult, other_side: &TraversalResult) -> bool {
    let mut shared = TraversalResult::from_set(expanded.v_set().clone());
    intersect(&mut shared, other_side);
    !shared.is_empty()
}

// =============================================================================
// ADD FRIENDSHIP
// =============================================================================

fn add_friendship<S: KvStore>(
    graph: &Graph<S>,
    person1: u64,
    person2: u64,
    creation_date: i64,
) -> Result<usize, GraphError> {
    let a = Entity::Person.vertex(person1);
    let b = Entity::Person.vertex(person2);
    let mut props = PropertyMap::new();
    props.insert("creationDate".to_string(), PropertyValue::Int(creation_date));

    graph.with_retry(|tx| {
        tx.add_edge(&a, KNOWS, &b, props.clone())?;
        tx.add_edge(&b, KNOWS, &a, props.clone())?;
        Ok(2)
    })
}
