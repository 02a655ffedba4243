//! Interprets one [`ParsedLine`] against a [`Database`]: resolves input
//! references, computes fingerprints via [`crate::hasher`], threads the
//! dedup-patch state machine, and dispatches to the kind-specific insert.
//!
//! This module performs no I/O and carries no state of its own — all
//! state (`current_dedup_patch`, the id→item lookup, the buffers) lives on
//! [`Database`], exactly as the design notes require.

use crate::database::{
    CreationRow, CreateVarCreationRow, DedupRow, InstructionRow, LiteralRow, RandCreationRow,
    SeqCreationRow,
};
use crate::grammar::{CreationRepr, ParsedLine, Representation, TypeTag};
use crate::{hasher, Database, ExecutionType, ItemId, TraceId, TraceItem};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::RngCore;

/// A failure interpreting one already-parsed line. Carries no file/line
/// context; [`crate::trace_loader`] attaches that before the error reaches
/// a caller.
///
/// `InvalidType` and `EmptyRecord` are kept for parity with the error kinds
/// named in the error-handling design, even though [`ParsedLine`] is a
/// closed enum that already rules both cases out at the grammar boundary:
/// an unrecognized type tag or a genuinely empty record fails to parse in
/// the first place and surfaces as a `GrammarError` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemLoadError {
    #[error("reference to unknown item ({0})")]
    MissingReference(ItemId),

    #[error("expected `true` or `false`, found {0:?}")]
    InvalidBoolean(String),

    #[error("unrecognized type tag {0:?}")]
    InvalidType(String),

    #[error("empty record (neither a representation, patch start, nor patch end)")]
    EmptyRecord,
}

fn coerce_bool(raw: &str) -> Result<bool, ItemLoadError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ItemLoadError::InvalidBoolean(other.to_string())),
    }
}

/// Execution types sampled per the fixed probability vector in the data
/// model: CP 0.90, CP_FILE 0.01, SPARK 0.04, GPU 0.05, FED 0.00.
const EXECUTION_TYPE_WEIGHTS: [(ExecutionType, f64); 5] = [
    (ExecutionType::Cp, 0.90),
    (ExecutionType::CpFile, 0.01),
    (ExecutionType::Spark, 0.04),
    (ExecutionType::Gpu, 0.05),
    (ExecutionType::Fed, 0.00),
];

fn sample_execution_type(rng: &mut dyn RngCore) -> ExecutionType {
    EXECUTION_TYPE_WEIGHTS
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(kind, _)| *kind)
        .unwrap_or(ExecutionType::Cp)
}

fn sample_execution_time_ms(rng: &mut dyn RngCore) -> u32 {
    rng.gen_range(10..1000)
}

/// Interprets one parsed line, mutating `db` in place.
///
/// Mirrors the five-step flow in the item loader's component design: patch
/// markers update `current_dedup_patch` and return; item lines resolve
/// inputs, compute both hashes, append a TraceItem, and dispatch to a
/// kind-specific insert.
pub fn load_parsed_line(
    db: &mut Database,
    trace_id: TraceId,
    parsed: ParsedLine,
    rng: &mut dyn RngCore,
) -> Result<(), ItemLoadError> {
    let (id, type_tag, representation) = match parsed {
        ParsedLine::PatchStart { patch_id } => {
            db.set_dedup_patch(patch_id);
            return Ok(());
        }
        ParsedLine::PatchEnd => {
            db.clear_dedup_patch();
            return Ok(());
        }
        ParsedLine::Item {
            id,
            type_tag,
            representation,
        } => (id, type_tag, representation),
    };

    let input_ids = representation.inputs().to_vec();
    let mut input_value_hashes = Vec::with_capacity(input_ids.len());
    let mut input_lineage_hashes = Vec::with_capacity(input_ids.len());
    for input_id in &input_ids {
        let (value_hash, lineage_hash) = db
            .resolve_input(trace_id, *input_id)
            .ok_or(ItemLoadError::MissingReference(*input_id))?;
        input_value_hashes.push(value_hash);
        input_lineage_hashes.push(lineage_hash);
    }
    let input_value_hash_refs: Vec<_> = input_value_hashes.iter().collect();
    let input_lineage_hash_refs: Vec<_> = input_lineage_hashes.iter().collect();

    let value_hash = hasher::value_hash(&representation, &input_value_hash_refs)
        .expect("canonical representation serialization never fails");
    let lineage_hash = hasher::lineage_hash(&representation, &input_lineage_hash_refs);

    if matches!(type_tag, TypeTag::Instruction | TypeTag::Dedup) {
        for input_value_hash in &input_value_hashes {
            db.push_lineage_edge(input_value_hash.clone(), value_hash.clone());
        }
    }

    let execution_time_ms = sample_execution_time_ms(rng);
    let dedup_patch_name = db.current_dedup_patch().map(str::to_string);

    db.push_trace_item(
        trace_id,
        TraceItem {
            trace_id,
            id,
            kind: type_tag.kind(),
            value_hash: value_hash.clone(),
            lineage_hash,
            dedup_patch_name,
            mem_size: None,
            execution_time_ms,
        },
    );

    match representation {
        Representation::Literal(repr) => {
            let flag = coerce_bool(&repr.flag)?;
            db.insert_literal(
                value_hash,
                LiteralRow {
                    value: repr.value,
                    data_type: repr.data_type,
                    value_type: repr.value_type,
                    flag,
                },
            );
        }
        Representation::Creation(repr) => {
            db.insert_creation(
                value_hash.clone(),
                CreationRow {
                    execution_type: repr.execution_type(),
                    creation_method: repr.method(),
                    dedup_in: match &repr {
                        CreationRepr::DedupIn { n } => Some(*n),
                        _ => None,
                    },
                },
            );
            insert_creation_method_row(db, value_hash, repr)?;
        }
        Representation::Instruction(repr) => {
            db.insert_instruction(
                value_hash,
                InstructionRow {
                    op_code: repr.op_code,
                    special_value_bits: repr.special_value_bits,
                    execution_type: sample_execution_type(rng),
                },
            );
        }
        Representation::Dedup(repr) => {
            db.insert_dedup(
                value_hash,
                DedupRow {
                    dedup_name: repr.dedup_name,
                },
            );
        }
    }

    Ok(())
}

fn insert_creation_method_row(
    db: &mut Database,
    value_hash: crate::ValueHash,
    repr: CreationRepr,
) -> Result<(), ItemLoadError> {
    match repr {
        CreationRepr::DedupIn { .. } => {}
        CreationRepr::Rand {
            mut other_params, ..
        } => {
            let pdf_index = other_params
                .iter()
                .position(|p| matches!(p, crate::grammar::param::Param::Distribution { .. }));
            let pdf = match pdf_index {
                Some(index) => match other_params.remove(index) {
                    crate::grammar::param::Param::Distribution { pdf } => pdf,
                    _ => unreachable!(),
                },
                None => String::new(),
            };
            db.insert_rand_creation(value_hash, RandCreationRow { pdf, other_params });
        }
        CreationRepr::CreateVar {
            function,
            file_name,
            file_overwrite,
            data_type,
            format,
            other_params,
            ..
        } => {
            let file_overwrite = coerce_bool(&file_overwrite)?;
            db.insert_createvar_creation(
                value_hash,
                CreateVarCreationRow {
                    function,
                    file_name,
                    file_overwrite,
                    data_type,
                    format,
                    other_params,
                },
            );
        }
        CreationRepr::Seq { other_params, .. } => {
            db.insert_seq_creation(value_hash, SeqCreationRow { other_params });
        }
    }
    Ok(())
}
