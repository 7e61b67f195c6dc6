//! # Storage Formats
//!
//! How graph entities map onto store keys and values. Pure transformations:
//! no store access happens here.

pub mod layout;

pub use layout::{
    EdgeEntry, EdgeList, VertexRecord, decode_edge_list, decode_vertex, edge_list_key,
    encode_edge_list, encode_vertex, vertex_key,
};
