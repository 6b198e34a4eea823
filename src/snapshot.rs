//! Snapshot codec and content hashing.
//!
//! The persisted blob is the whole node map, MessagePack-encoded with named
//! fields and wrapped in a zlib (DEFLATE) container. The encoding sorts nodes
//! by id so that equal graphs produce equal bytes; any compliant
//! MessagePack/DEFLATE pair can read or write the blob.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use ahash::AHashMap;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::{errors::SyncGraphError, store::NodeRecord};

/// Length of a content-derived node id in hex characters.
const CONTENT_ID_LEN: usize = 16;

pub fn encode(nodes: &AHashMap<String, NodeRecord>) -> Result<Vec<u8>, SyncGraphError> {
    let packed = pack_sorted(nodes)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&packed)
        .map_err(|e| SyncGraphError::serialization(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| SyncGraphError::serialization(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<AHashMap<String, NodeRecord>, SyncGraphError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut packed = Vec::new();
    decoder
        .read_to_end(&mut packed)
        .map_err(|e| SyncGraphError::serialization(e.to_string()))?;
    let nodes: BTreeMap<String, NodeRecord> = rmp_serde::from_slice(&packed)
        .map_err(|e| SyncGraphError::serialization(e.to_string()))?;
    Ok(nodes.into_iter().collect())
}

/// Hash of the uncompressed, id-sorted encoding. Replicas holding equal
/// graphs report equal hashes regardless of map iteration order.
pub fn content_hash(nodes: &AHashMap<String, NodeRecord>) -> Result<String, SyncGraphError> {
    let packed = pack_sorted(nodes)?;
    Ok(blake3::hash(&packed).to_hex().to_string())
}

/// Derives a stable node id from a value for callers that do not supply one.
pub fn content_id(value: &serde_json::Value) -> Result<String, SyncGraphError> {
    let packed =
        rmp_serde::to_vec_named(value).map_err(|e| SyncGraphError::serialization(e.to_string()))?;
    Ok(blake3::hash(&packed).to_hex()[..CONTENT_ID_LEN].to_string())
}

/// One blob per database instance.
pub fn blob_name(db_name: &str) -> String {
    format!("{db_name}_graph.msgpack")
}

fn pack_sorted(nodes: &AHashMap<String, NodeRecord>) -> Result<Vec<u8>, SyncGraphError> {
    let ordered: BTreeMap<&str, &NodeRecord> =
        nodes.iter().map(|(id, node)| (id.as_str(), node)).collect();
    rmp_serde::to_vec_named(&ordered).map_err(|e| SyncGraphError::serialization(e.to_string()))
}
