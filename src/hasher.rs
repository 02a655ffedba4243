//! Computes the two content-addressing fingerprints described in the data
//! model: [`value_hash`] (observable value identity) and [`lineage_hash`]
//! (derivation shape, independent of literal contents).
//!
//! Both are SHA-256 hex digests over UTF-8 bytes. Canonicalization for a
//! literal or creation's `value_hash` is just `serde_json::to_vec` over
//! the parsed [`Representation`] — field order in the derived `Serialize`
//! impls is declaration order, which is already stable, so there is no
//! need to preserve a dynamic key order the way a JSON object built at
//! runtime would.

use crate::grammar::{CreationRepr, Representation};
use crate::{LineageHash, ValueHash};
use sha2::{Digest, Sha256};

/// Computes `value_hash` for an item given its already-hashed inputs, in
/// the same order the grammar recorded them.
pub fn value_hash(
    representation: &Representation,
    input_value_hashes: &[&ValueHash],
) -> Result<ValueHash, serde_json::Error> {
    let mut hasher = Sha256::new();
    match representation {
        Representation::Literal(_) | Representation::Creation(_) => {
            let bytes = serde_json::to_vec(representation)?;
            hasher.update(&bytes);
        }
        Representation::Instruction(repr) => {
            for h in input_value_hashes {
                hasher.update(h.as_str().as_bytes());
            }
            hasher.update(repr.op_code.as_bytes());
            match repr.special_value_bits {
                Some(bits) => hasher.update(bits.to_string().as_bytes()),
                None => hasher.update(b""),
            }
        }
        Representation::Dedup(repr) => {
            for h in input_value_hashes {
                hasher.update(h.as_str().as_bytes());
            }
            hasher.update(repr.dedup_name.as_bytes());
        }
    }
    Ok(ValueHash::from_digest(hasher.finalize()))
}

/// Computes `lineage_hash` for an item given its inputs' lineage_hashes, in
/// the same order the grammar recorded them.
pub fn lineage_hash(representation: &Representation, input_lineage_hashes: &[&LineageHash]) -> LineageHash {
    let mut hasher = Sha256::new();
    match representation {
        Representation::Literal(_) => {
            hasher.update(b"L");
        }
        Representation::Creation(repr) => {
            hasher.update(b"C");
            match repr {
                CreationRepr::DedupIn { n } => hasher.update(format!("IN#{}", n).as_bytes()),
                CreationRepr::Rand { .. } => hasher.update(b"rand"),
                CreationRepr::CreateVar { .. } => hasher.update(b"createvar"),
                CreationRepr::Seq { .. } => hasher.update(b"seq"),
            }
        }
        Representation::Instruction(repr) => {
            for h in input_lineage_hashes {
                hasher.update(h.as_str().as_bytes());
            }
            hasher.update(repr.op_code.as_bytes());
        }
        Representation::Dedup(repr) => {
            for h in input_lineage_hashes {
                hasher.update(h.as_str().as_bytes());
            }
            hasher.update(repr.dedup_name.as_bytes());
        }
    }
    LineageHash::from_digest(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::LiteralRepr;
    use crate::{DataType, ValueType};

    fn literal(value: &str) -> Representation {
        Representation::Literal(LiteralRepr {
            value: value.to_string(),
            data_type: DataType::Scalar,
            value_type: ValueType::Int64,
            flag: "true".to_string(),
        })
    }

    #[test]
    fn hash_determinism() {
        let repr = literal("1");
        let a = value_hash(&repr, &[]).unwrap();
        let b = value_hash(&repr, &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn value_and_lineage_split_for_literals() {
        let repr_a = literal("1");
        let repr_b = literal("2");
        let value_a = value_hash(&repr_a, &[]).unwrap();
        let value_b = value_hash(&repr_b, &[]).unwrap();
        assert_ne!(value_a, value_b);

        let lineage_a = lineage_hash(&repr_a, &[]);
        let lineage_b = lineage_hash(&repr_b, &[]);
        assert_eq!(lineage_a, lineage_b);
    }

    #[test]
    fn instruction_lineage_hash_excludes_special_value_bits() {
        use crate::grammar::InstructionRepr;
        let without_bits = Representation::Instruction(InstructionRepr {
            op_code: "plus".to_string(),
            inputs: vec![],
            special_value_bits: None,
        });
        let with_bits = Representation::Instruction(InstructionRepr {
            op_code: "plus".to_string(),
            inputs: vec![],
            special_value_bits: Some(7),
        });
        assert_eq!(
            lineage_hash(&without_bits, &[]),
            lineage_hash(&with_bits, &[])
        );
        assert_ne!(
            value_hash(&without_bits, &[]).unwrap(),
            value_hash(&with_bits, &[]).unwrap()
        );
    }
}
