//! Typed in-memory buffers, one per entity in the data model, plus
//! finalization into deduplicated relational tables.
//!
//! During ingestion every per-value-hash entity is kept in a
//! `HashMap<ValueHash, Row>` populated via `entry().or_insert_with(..)` —
//! first-insert-wins, sidestepping the post-hoc dedup pass the design
//! notes call out as optional. `TraceItem` and `LineageEdge` use their own
//! buffers with the dedup rule each entity calls for instead.

use crate::grammar::param::Param;
use crate::op_info::OpInfo;
use crate::{
    CreationMethod, DataType, ExecutionType, ItemId, LineageHash, Trace, TraceId, TraceItem,
    ValueHash, ValueType,
};
use std::collections::{HashMap, HashSet};

/// One row of the `literal` table.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralRow {
    pub value: String,
    pub data_type: DataType,
    pub value_type: ValueType,
    pub flag: bool,
}

/// One row of the `instruction` table.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionRow {
    pub op_code: String,
    pub special_value_bits: Option<u64>,
    pub execution_type: ExecutionType,
}

/// One row of the `dedup` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRow {
    pub dedup_name: String,
}

/// One row of the `creation` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRow {
    pub execution_type: Option<ExecutionType>,
    pub creation_method: CreationMethod,
    pub dedup_in: Option<u64>,
}

/// One row of the `rand_creation` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RandCreationRow {
    pub pdf: String,
    pub other_params: Vec<Param>,
}

/// One row of the `createvar_creation` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVarCreationRow {
    pub function: String,
    pub file_name: String,
    pub file_overwrite: bool,
    pub data_type: DataType,
    pub format: String,
    pub other_params: Vec<Param>,
}

/// One row of the `seq_creation` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqCreationRow {
    pub other_params: Vec<Param>,
}

/// One row of the `lineage` table: an (input, consumer) value_hash pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineageEdge {
    pub value_hash: ValueHash,
    pub is_input_for_value_hash: ValueHash,
}

/// The deduplicated relational tables produced by [`Database::finalize`].
#[derive(Debug, Clone, Default)]
pub struct FinalizedTables {
    pub trace: Vec<Trace>,
    pub trace_item: Vec<TraceItem>,
    pub instruction: HashMap<ValueHash, InstructionRow>,
    pub dedup: HashMap<ValueHash, DedupRow>,
    pub creation: HashMap<ValueHash, CreationRow>,
    pub rand_creation: HashMap<ValueHash, RandCreationRow>,
    pub createvar_creation: HashMap<ValueHash, CreateVarCreationRow>,
    pub seq_creation: HashMap<ValueHash, SeqCreationRow>,
    pub literal: HashMap<ValueHash, LiteralRow>,
    pub lineage: Vec<LineageEdge>,
}

/// Accumulates trace data across one or more ingested files.
///
/// Call [`Database::register_trace`] once per file (this is normally done
/// by [`crate::TraceLoader`], not directly), feed parsed lines through
/// [`crate::item_loader::load_parsed_line`], then call [`Database::finalize`]
/// to collapse the buffers into [`FinalizedTables`].
#[derive(Debug, Default)]
pub struct Database {
    traces: Vec<Trace>,
    trace_items: Vec<TraceItem>,
    id_index: HashMap<(TraceId, ItemId), usize>,
    current_dedup_patch: Option<String>,
    literals: HashMap<ValueHash, LiteralRow>,
    instructions: HashMap<ValueHash, InstructionRow>,
    dedups: HashMap<ValueHash, DedupRow>,
    creations: HashMap<ValueHash, CreationRow>,
    rand_creations: HashMap<ValueHash, RandCreationRow>,
    createvar_creations: HashMap<ValueHash, CreateVarCreationRow>,
    seq_creations: HashMap<ValueHash, SeqCreationRow>,
    lineage_edges: Vec<LineageEdge>,
    /// Populated by [`crate::op_info::load`], if the caller chooses to. Never
    /// read or written by `finalize`; it's an external reference table, not
    /// part of the core pipeline's output.
    pub op_info: Option<HashMap<String, OpInfo>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next sequential trace id and appends a `Trace` row.
    /// Resets `current_dedup_patch` to `None`, per the trace loader's
    /// per-file reset.
    pub fn register_trace(&mut self, file: String, date: chrono::DateTime<chrono::Utc>) -> TraceId {
        let id = TraceId::from(self.traces.len() as u32);
        let name = std::path::Path::new(&file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        self.traces.push(Trace {
            id,
            date,
            file,
            name,
            description: String::new(),
            total_execution_time_ms: 0,
        });
        self.current_dedup_patch = None;
        id
    }

    pub fn current_dedup_patch(&self) -> Option<&str> {
        self.current_dedup_patch.as_deref()
    }

    pub fn set_dedup_patch(&mut self, patch_id: String) {
        self.current_dedup_patch = Some(patch_id);
    }

    pub fn clear_dedup_patch(&mut self) {
        self.current_dedup_patch = None;
    }

    /// Looks up an already-ingested item's fingerprints by its raw id
    /// within a trace, for input-reference resolution.
    pub fn resolve_input(
        &self,
        trace_id: TraceId,
        item_id: ItemId,
    ) -> Option<(ValueHash, LineageHash)> {
        let index = *self.id_index.get(&(trace_id, item_id))?;
        let item = &self.trace_items[index];
        Some((item.value_hash.clone(), item.lineage_hash.clone()))
    }

    pub fn trace_items(&self) -> &[TraceItem] {
        &self.trace_items
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Appends a `TraceItem` and registers it in the id→item lookup under
    /// its raw id, scoped to `trace_id`.
    pub fn push_trace_item(&mut self, trace_id: TraceId, item: TraceItem) {
        let item_id = item.id();
        let index = self.trace_items.len();
        self.trace_items.push(item);
        self.id_index.insert((trace_id, item_id), index);
    }

    pub fn push_lineage_edge(&mut self, value_hash: ValueHash, is_input_for_value_hash: ValueHash) {
        self.lineage_edges.push(LineageEdge {
            value_hash,
            is_input_for_value_hash,
        });
    }

    pub fn insert_literal(&mut self, value_hash: ValueHash, row: LiteralRow) {
        self.literals.entry(value_hash).or_insert(row);
    }

    pub fn insert_instruction(&mut self, value_hash: ValueHash, row: InstructionRow) {
        self.instructions.entry(value_hash).or_insert(row);
    }

    pub fn insert_dedup(&mut self, value_hash: ValueHash, row: DedupRow) {
        self.dedups.entry(value_hash).or_insert(row);
    }

    pub fn insert_creation(&mut self, value_hash: ValueHash, row: CreationRow) {
        self.creations.entry(value_hash).or_insert(row);
    }

    pub fn insert_rand_creation(&mut self, value_hash: ValueHash, row: RandCreationRow) {
        self.rand_creations.entry(value_hash).or_insert(row);
    }

    pub fn insert_createvar_creation(&mut self, value_hash: ValueHash, row: CreateVarCreationRow) {
        self.createvar_creations.entry(value_hash).or_insert(row);
    }

    pub fn insert_seq_creation(&mut self, value_hash: ValueHash, row: SeqCreationRow) {
        self.seq_creations.entry(value_hash).or_insert(row);
    }

    /// Converts buffers into deduplicated tables and clears them, along
    /// with the id→item lookup. `op_info`, if set, is left untouched.
    pub fn finalize(&mut self) -> FinalizedTables {
        let mut seen_edges = HashSet::new();
        let lineage = std::mem::take(&mut self.lineage_edges)
            .into_iter()
            .filter(|edge| {
                seen_edges.insert((edge.value_hash.clone(), edge.is_input_for_value_hash.clone()))
            })
            .collect();

        let tables = FinalizedTables {
            trace: std::mem::take(&mut self.traces),
            trace_item: std::mem::take(&mut self.trace_items),
            instruction: std::mem::take(&mut self.instructions),
            dedup: std::mem::take(&mut self.dedups),
            creation: std::mem::take(&mut self.creations),
            rand_creation: std::mem::take(&mut self.rand_creations),
            createvar_creation: std::mem::take(&mut self.createvar_creations),
            seq_creation: std::mem::take(&mut self.seq_creations),
            literal: std::mem::take(&mut self.literals),
            lineage,
        };
        self.id_index.clear();
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_value_hash_tables_keep_first_insert() {
        let mut db = Database::new();
        let value_hash = ValueHash::from_digest([1, 2, 3]);
        db.insert_literal(
            value_hash.clone(),
            LiteralRow {
                value: "1".into(),
                data_type: DataType::Scalar,
                value_type: ValueType::Int64,
                flag: true,
            },
        );
        db.insert_literal(
            value_hash.clone(),
            LiteralRow {
                value: "2".into(),
                data_type: DataType::Scalar,
                value_type: ValueType::Int64,
                flag: false,
            },
        );
        let tables = db.finalize();
        assert_eq!(tables.literal.len(), 1);
        assert_eq!(tables.literal[&value_hash].value, "1");
    }

    #[test]
    fn lineage_edges_dedup_on_composite_key() {
        let mut db = Database::new();
        let a = ValueHash::from_digest([1]);
        let b = ValueHash::from_digest([2]);
        db.push_lineage_edge(a.clone(), b.clone());
        db.push_lineage_edge(a.clone(), b.clone());
        let tables = db.finalize();
        assert_eq!(tables.lineage.len(), 1);
    }

    #[test]
    fn finalize_resets_id_lookup() {
        let mut db = Database::new();
        let trace_id = db.register_trace("a.lineage".into(), chrono::Utc::now());
        db.push_trace_item(
            trace_id,
            TraceItem {
                trace_id,
                id: ItemId::from(1),
                kind: crate::TraceItemKind::Literal,
                value_hash: ValueHash::from_digest([9]),
                lineage_hash: LineageHash::from_digest([9]),
                dedup_patch_name: None,
                mem_size: None,
                execution_time_ms: 10,
            },
        );
        assert!(db.resolve_input(trace_id, ItemId::from(1)).is_some());
        db.finalize();
        assert!(db.resolve_input(trace_id, ItemId::from(1)).is_none());
    }
}
