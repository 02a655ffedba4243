//! A library for ingesting data-processing lineage traces into a
//! content-addressed, relational in-memory model.
//!
//! See [`TraceLoader`] to get started: it drives the [`grammar`] over a
//! trace file, feeds each parsed line through the [`item_loader`], and
//! accumulates rows in a [`Database`]. Call [`Database::finalize`] once
//! all traces are loaded to get deduplicated [`FinalizedTables`].
//!
//! # Examples
//!
//! Loading two trace files into one database and inspecting the result:
//!
//! ```no_run
//! use lineage_trace::{Database, TraceLoader};
//!
//! let mut db = Database::new();
//! let mut loader = TraceLoader::new();
//! loader.load_file("traces/run1.lineage", &mut db).unwrap();
//! loader.load_file("traces/run2.lineage", &mut db).unwrap();
//!
//! let tables = db.finalize();
//! println!("{} traces, {} trace items", tables.trace.len(), tables.trace_item.len());
//! ```

use getset::CopyGetters;
use std::fmt;

pub mod database;
pub mod error;
pub mod grammar;
pub mod hasher;
pub mod item_loader;
pub mod op_info;
pub mod trace_loader;

pub use database::{Database, FinalizedTables};
pub use error::LoadError;
pub use trace_loader::TraceLoader;

/// The id of an item within a single trace file, as written in the trace
/// (e.g. the `7` in `(7)`).
///
/// Ids are scoped to a single trace: two different traces may reuse the
/// same [`ItemId`] for unrelated items, so lookups are always keyed on
/// `(TraceId, ItemId)`.
#[derive(CopyGetters, Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ItemId {
    #[get_copy = "pub"]
    id: u64,
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId { id }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The id of a loaded [`Trace`], assigned sequentially starting at 0 in
/// the order traces are registered with a [`Database`].
#[derive(CopyGetters, Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TraceId {
    #[get_copy = "pub"]
    id: u32,
}

impl From<u32> for TraceId {
    fn from(id: u32) -> Self {
        TraceId { id }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A content fingerprint of an item's *observable value*: a lowercase hex
/// SHA-256 digest. Two items with the same [`ValueHash`] are considered the
/// same value; downstream per-value-hash tables store one row per unique
/// value_hash.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ValueHash(String);

/// A structural fingerprint of an item's *derivation shape*, independent of
/// literal contents: a lowercase hex SHA-256 digest. Two items with the
/// same [`LineageHash`] arose from structurally identical computations.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct LineageHash(String);

macro_rules! hash_newtype {
    ($name:ident) => {
        impl $name {
            pub(crate) fn from_digest(digest: impl AsRef<[u8]>) -> Self {
                $name(hex::encode(digest))
            }

            /// The lowercase hex digest.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

hash_newtype!(ValueHash);
hash_newtype!(LineageHash);

/// What kind of record a [`TraceItem`] was parsed from.
///
/// Mirrors the short grammar type tags (`L`, `C`, `I`, `D`) under their
/// long names, per the mapping in the data model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TraceItemKind {
    Instruction,
    Creation,
    Literal,
    Dedup,
}

/// The physical backend that ran an instruction or creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum_macros::EnumIter, serde::Serialize)]
pub enum ExecutionType {
    Cp,
    CpFile,
    Spark,
    Gpu,
    Fed,
}

/// How a value was materialized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CreationMethod {
    Rand,
    CreateVar,
    Seq,
    In,
}

/// The shape of a literal or creation-parameter value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    Scalar,
    Frame,
    Matrix,
    List,
}

/// The scalar element type of a literal or creation-parameter value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ValueType {
    Int64,
    Fp64,
    String,
    Boolean,
}

/// One row of the `trace` table: metadata about a single ingested file.
#[derive(Debug, Clone, CopyGetters)]
pub struct Trace {
    #[get_copy = "pub"]
    id: TraceId,
    /// Last-modified time of the source file, in UTC.
    pub date: chrono::DateTime<chrono::Utc>,
    pub file: String,
    pub name: String,
    pub description: String,
    /// Never updated by this crate; see the design notes on why the
    /// source leaves this at zero.
    pub total_execution_time_ms: u64,
}

/// One row of the `trace_item` table: one parsed `(id) (type) repr` record.
#[derive(Debug, Clone, CopyGetters)]
pub struct TraceItem {
    #[get_copy = "pub"]
    trace_id: TraceId,
    #[get_copy = "pub"]
    id: ItemId,
    pub kind: TraceItemKind,
    pub value_hash: ValueHash,
    pub lineage_hash: LineageHash,
    pub dedup_patch_name: Option<String>,
    /// Always `None`; no record form in this grammar carries a memory size.
    pub mem_size: Option<u64>,
    pub execution_time_ms: u32,
}
