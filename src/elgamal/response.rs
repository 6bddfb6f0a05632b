use std::collections::BTreeMap;

use ark_ec::CurveGroup;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

use super::{CipherVector, Ciphertext};
use crate::error::{ProofError, ProofResult};
use crate::suite::{width, write_bytes, write_u32, WireReader};

/// One encrypted record as seen by a shuffling node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ProcessResponse<C: CurveGroup> {
    pub group_by_enc: CipherVector<C>,
    pub where_enc: CipherVector<C>,
    pub aggregating_attributes: CipherVector<C>,
}

/// Arities `(L1, L2, L3)` of the three parts of a record.
pub type RecordShape = (usize, usize, usize);

impl<C: CurveGroup> ProcessResponse<C> {
    pub fn new(
        group_by_enc: CipherVector<C>,
        where_enc: CipherVector<C>,
        aggregating_attributes: CipherVector<C>,
    ) -> Self {
        Self {
            group_by_enc,
            where_enc,
            aggregating_attributes,
        }
    }

    /// Record carrying only aggregating attributes.
    pub fn from_attributes(aggregating_attributes: CipherVector<C>) -> Self {
        Self::new(
            CipherVector::default(),
            CipherVector::default(),
            aggregating_attributes,
        )
    }

    pub fn shape(&self) -> RecordShape {
        (
            self.group_by_enc.len(),
            self.where_enc.len(),
            self.aggregating_attributes.len(),
        )
    }

    pub fn len(&self) -> usize {
        let (l1, l2, l3) = self.shape();
        l1 + l2 + l3
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in the canonical order: group-by, where, aggregating attributes.
    pub fn slots(&self) -> impl Iterator<Item = &Ciphertext<C>> {
        self.group_by_enc
            .iter()
            .chain(self.where_enc.iter())
            .chain(self.aggregating_attributes.iter())
    }

    pub fn flatten(&self) -> Vec<Ciphertext<C>> {
        self.slots().cloned().collect()
    }

    /// Adds `(β_j g, β_j h)` to slot `j` in canonical order.
    pub fn rerandomize_with(&self, betas: &[C::ScalarField], g: C, h: C) -> ProofResult<Self> {
        if betas.len() != self.len() {
            return Err(ProofError::LengthMismatch {
                expected: self.len(),
                actual: betas.len(),
            });
        }
        let slots = self
            .slots()
            .zip(betas)
            .map(|(ct, beta)| ct.rerandomize_with_bases(*beta, g, h))
            .collect();
        Self::from_slots(slots, self.shape())
    }

    /// Rebuilds a record from slots in canonical order.
    pub fn from_slots(slots: Vec<Ciphertext<C>>, shape: RecordShape) -> ProofResult<Self> {
        let (l1, l2, l3) = shape;
        if slots.len() != l1 + l2 + l3 {
            return Err(ProofError::LengthMismatch {
                expected: l1 + l2 + l3,
                actual: slots.len(),
            });
        }
        let mut slots = slots;
        let aggr = slots.split_off(l1 + l2);
        let where_enc = slots.split_off(l1);
        Ok(Self::new(slots.into(), where_enc.into(), aggr.into()))
    }

    pub fn write_slots(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        self.group_by_enc.write_slots(out)?;
        self.where_enc.write_slots(out)?;
        self.aggregating_attributes.write_slots(out)
    }

    pub fn read_slots(reader: &mut WireReader<'_>, shape: RecordShape) -> ProofResult<Self> {
        let (l1, l2, l3) = shape;
        Ok(Self::new(
            CipherVector::read_slots(reader, l1)?,
            CipherVector::read_slots(reader, l2)?,
            CipherVector::read_slots(reader, l3)?,
        ))
    }
}

fn shape_byte(len: usize) -> ProofResult<u8> {
    u8::try_from(len)
        .map_err(|_| ProofError::InvalidInput(format!("record arity {len} exceeds 255")))
}

/// Shape shared by every record of a list; mixed shapes are rejected.
pub fn list_shape<C: CurveGroup>(list: &[ProcessResponse<C>]) -> ProofResult<RecordShape> {
    let shape = list.first().map(|r| r.shape()).unwrap_or((0, 0, 0));
    if let Some(bad) = list.iter().find(|r| r.shape() != shape) {
        return Err(ProofError::InvalidInput(format!(
            "record shape {:?} differs from {:?}",
            bad.shape(),
            shape
        )));
    }
    Ok(shape)
}

/// Writes `[L1][L2][L3]` as single bytes, a u32 record count and then the records.
pub fn write_process_responses<C: CurveGroup>(
    list: &[ProcessResponse<C>],
    out: &mut Vec<u8>,
) -> ProofResult<()> {
    let (l1, l2, l3) = list_shape(list)?;
    out.push(shape_byte(l1)?);
    out.push(shape_byte(l2)?);
    out.push(shape_byte(l3)?);
    write_u32(out, list.len())?;
    for record in list {
        record.write_slots(out)?;
    }
    Ok(())
}

pub fn read_process_responses<C: CurveGroup>(
    reader: &mut WireReader<'_>,
) -> ProofResult<Vec<ProcessResponse<C>>> {
    let shape = (
        reader.read_u8()? as usize,
        reader.read_u8()? as usize,
        reader.read_u8()? as usize,
    );
    let count = reader.read_u32()? as usize;
    let record_len = (shape.0 + shape.1 + shape.2) * 2 * width::<C>();
    reader.check_count(count, record_len)?;
    (0..count)
        .map(|_| ProcessResponse::read_slots(reader, shape))
        .collect()
}

/// Encrypted contribution of one data provider for one clear grouping key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ResponseDPOneGroup<C: CurveGroup> {
    pub group: String,
    pub data: CipherVector<C>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ResponseAllDPs<C: CurveGroup> {
    pub data: Vec<ResponseDPOneGroup<C>>,
}

impl<C: CurveGroup> Default for ResponseAllDPs<C> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<C: CurveGroup> ResponseAllDPs<C> {
    pub fn new(data: Vec<ResponseDPOneGroup<C>>) -> Self {
        Self { data }
    }

    pub fn push(&mut self, group: impl Into<String>, data: CipherVector<C>) {
        self.data.push(ResponseDPOneGroup {
            group: group.into(),
            data,
        });
    }

    /// Homomorphic sum per grouping key. Items of one key must share a length.
    pub fn group_sum(&self) -> ProofResult<BTreeMap<String, CipherVector<C>>> {
        let mut groups: BTreeMap<String, CipherVector<C>> = BTreeMap::new();
        for item in &self.data {
            match groups.get_mut(&item.group) {
                Some(acc) => *acc = acc.add(&item.data)?,
                None => {
                    groups.insert(item.group.clone(), item.data.clone());
                }
            }
        }
        Ok(groups)
    }

    /// Inverse of [`ResponseAllDPs::group_sum`]'s output shape, one item per key.
    pub fn from_groups(groups: BTreeMap<String, CipherVector<C>>) -> Self {
        Self::new(
            groups
                .into_iter()
                .map(|(group, data)| ResponseDPOneGroup { group, data })
                .collect(),
        )
    }

    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        write_u32(out, self.data.len())?;
        for item in &self.data {
            write_bytes(out, item.group.as_bytes())?;
            item.data.write_bytes(out)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        let count = reader.read_u32()? as usize;
        // group length prefix and vector length prefix
        reader.check_count(count, 8)?;
        let data = (0..count)
            .map(|_| {
                let group = String::from_utf8(reader.read_bytes()?.to_vec())
                    .map_err(|err| ProofError::Malformed(format!("group key: {err}")))?;
                let data = CipherVector::read(reader)?;
                Ok(ResponseDPOneGroup { group, data })
            })
            .collect::<ProofResult<Vec<_>>>()?;
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{DiscreteLogTable, KeyPair};
    use crate::test_utils::serde::assert_round_trip_eq;
    use ark_bn254::G1Projective;
    use ark_std::test_rng;

    type Curve = G1Projective;

    #[test]
    fn slots_follow_canonical_order() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let record = ProcessResponse::new(
            CipherVector::encrypt(keys.public_key, &[1], &mut rng),
            CipherVector::encrypt(keys.public_key, &[2, 3], &mut rng),
            CipherVector::encrypt(keys.public_key, &[4], &mut rng),
        );
        assert_eq!(record.shape(), (1, 2, 1));
        let slots: Vec<_> = record.slots().cloned().collect();
        let table = DiscreteLogTable::global::<Curve>(1_000);
        let plain: Vec<i64> = slots
            .iter()
            .map(|ct| table.decrypt(keys.secret_key, ct).unwrap())
            .collect();
        assert_eq!(plain, vec![1, 2, 3, 4]);
        assert_eq!(ProcessResponse::from_slots(slots, (1, 2, 1)).unwrap(), record);
    }

    #[test]
    fn list_bytes_round_trip_and_reject_mixed_shapes() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let list: Vec<_> = (0..3)
            .map(|i| {
                ProcessResponse::from_attributes(CipherVector::encrypt(
                    keys.public_key,
                    &[i, i + 1],
                    &mut rng,
                ))
            })
            .collect();
        let mut bytes = Vec::new();
        write_process_responses(&list, &mut bytes).unwrap();
        assert_eq!(&bytes[..3], &[0, 0, 2]);
        let mut reader = WireReader::new(&bytes);
        assert_eq!(read_process_responses::<Curve>(&mut reader).unwrap(), list);
        reader.finish().unwrap();

        let mut mixed = list.clone();
        mixed.push(ProcessResponse::from_attributes(CipherVector::encrypt(
            keys.public_key,
            &[1],
            &mut rng,
        )));
        assert!(write_process_responses(&mixed, &mut Vec::new()).is_err());
    }

    #[test]
    fn oversized_counts_are_rejected_before_reading() {
        let mut empty_records = vec![0, 0, 0];
        empty_records.extend_from_slice(&5_000_000u32.to_be_bytes());
        let mut reader = WireReader::new(&empty_records);
        assert!(matches!(
            read_process_responses::<Curve>(&mut reader),
            Err(ProofError::Malformed(_))
        ));

        let mut empty_list = vec![0, 0, 0];
        empty_list.extend_from_slice(&0u32.to_be_bytes());
        let mut reader = WireReader::new(&empty_list);
        assert!(read_process_responses::<Curve>(&mut reader).unwrap().is_empty());

        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let record = ProcessResponse::from_attributes(CipherVector::encrypt(
            keys.public_key,
            &[7],
            &mut rng,
        ));
        let mut bytes = Vec::new();
        write_process_responses(&[record], &mut bytes).unwrap();
        bytes[3..7].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut reader = WireReader::new(&bytes);
        assert!(read_process_responses::<Curve>(&mut reader).is_err());

        let mut groups = u32::MAX.to_be_bytes().to_vec();
        groups.extend_from_slice(&[0; 16]);
        assert!(ResponseAllDPs::<Curve>::read(&mut WireReader::new(&groups)).is_err());
    }

    #[test]
    fn group_sum_adds_per_key() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let mut all = ResponseAllDPs::default();
        all.push("a", CipherVector::encrypt(keys.public_key, &[1, 2], &mut rng));
        all.push("b", CipherVector::encrypt(keys.public_key, &[5], &mut rng));
        all.push("a", CipherVector::encrypt(keys.public_key, &[3, 4], &mut rng));

        let sums = all.group_sum().unwrap();
        let table = DiscreteLogTable::global::<Curve>(1_000);
        assert_eq!(table.decrypt_vector(keys.secret_key, &sums["a"]).unwrap(), vec![4, 6]);
        assert_eq!(table.decrypt_vector(keys.secret_key, &sums["b"]).unwrap(), vec![5]);

        all.push("b", CipherVector::encrypt(keys.public_key, &[1, 1], &mut rng));
        assert!(all.group_sum().is_err());
        assert_round_trip_eq(&all);
    }
}
