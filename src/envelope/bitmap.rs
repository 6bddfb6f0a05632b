use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ProofCode, ProofKind};

/// Identifies one proof: who sent it, what it proves, and which of the
/// sender's proofs of that kind it is.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitmapKey {
    pub sender: String,
    pub kind: ProofKind,
    pub differ_info: String,
}

impl BitmapKey {
    pub fn new(sender: impl Into<String>, kind: ProofKind, differ_info: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            kind,
            differ_info: differ_info.into(),
        }
    }
}

/// Per-survey verification outcomes. Expected proofs that never arrived read
/// as [`ProofCode::ProofNotReceived`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationBitmap {
    expected: [usize; 5],
    #[serde(with = "entry_list")]
    entries: BTreeMap<BitmapKey, ProofCode>,
}

/// JSON objects only take string keys; entries travel as a list of pairs.
mod entry_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{BitmapKey, ProofCode};

    pub fn serialize<S: Serializer>(
        entries: &BTreeMap<BitmapKey, ProofCode>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        entries.iter().collect::<Vec<_>>().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<BitmapKey, ProofCode>, D::Error> {
        Ok(Vec::<(BitmapKey, ProofCode)>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}

impl VerificationBitmap {
    /// `expected` is ordered like [`ProofKind::ALL`].
    pub fn new(expected: [usize; 5]) -> Self {
        Self {
            expected,
            entries: BTreeMap::new(),
        }
    }

    pub fn expected(&self, kind: ProofKind) -> usize {
        self.expected[kind.index()]
    }

    /// Stores `code`, returning the code previously recorded under `key`.
    pub fn record(&mut self, key: BitmapKey, code: ProofCode) -> Option<ProofCode> {
        self.entries.insert(key, code)
    }

    pub fn get(&self, key: &BitmapKey) -> Option<ProofCode> {
        self.entries.get(key).copied()
    }

    pub fn received(&self, kind: ProofKind) -> usize {
        self.entries.keys().filter(|key| key.kind == kind).count()
    }

    pub fn missing(&self, kind: ProofKind) -> usize {
        self.expected(kind).saturating_sub(self.received(kind))
    }

    pub fn is_complete(&self) -> bool {
        ProofKind::ALL.iter().all(|kind| self.missing(*kind) == 0)
    }

    /// Complete and free of failed proofs or signatures.
    pub fn all_valid(&self) -> bool {
        self.is_complete() && self.entries.values().all(|code| code.is_acceptable())
    }

    /// Every slot grouped by kind: recorded codes in key order, then one
    /// `ProofNotReceived` per missing proof.
    pub fn codes(&self) -> Vec<(ProofKind, ProofCode)> {
        let mut out = Vec::new();
        for kind in ProofKind::ALL {
            out.extend(
                self.entries
                    .iter()
                    .filter(|(key, _)| key.kind == kind)
                    .map(|(_, code)| (kind, *code)),
            );
            out.extend(std::iter::repeat((kind, ProofCode::ProofNotReceived)).take(self.missing(kind)));
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BitmapKey, &ProofCode)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn missing_proofs_read_as_not_received() {
        let mut bitmap = VerificationBitmap::new([2, 0, 1, 0, 0]);
        assert!(!bitmap.is_complete());
        bitmap.record(BitmapKey::new("dp0", ProofKind::Range, "0"), ProofCode::ProofTrue);

        let codes = bitmap.codes();
        assert_eq!(
            codes,
            vec![
                (ProofKind::Range, ProofCode::ProofTrue),
                (ProofKind::Range, ProofCode::ProofNotReceived),
                (ProofKind::Aggregation, ProofCode::ProofNotReceived),
            ]
        );
        assert_eq!(bitmap.missing(ProofKind::Range), 1);
    }

    #[test]
    fn verdict_needs_every_proof_and_no_failures() {
        let mut bitmap = VerificationBitmap::new([1, 0, 1, 0, 0]);
        bitmap.record(BitmapKey::new("dp0", ProofKind::Range, "0"), ProofCode::ProofReceived);
        assert!(!bitmap.all_valid());

        bitmap.record(BitmapKey::new("cn0", ProofKind::Aggregation, ""), ProofCode::ProofTrue);
        assert!(bitmap.all_valid());

        let previous = bitmap.record(
            BitmapKey::new("cn0", ProofKind::Aggregation, ""),
            ProofCode::ProofFalseSign,
        );
        assert_eq!(previous, Some(ProofCode::ProofTrue));
        assert!(bitmap.is_complete());
        assert!(!bitmap.all_valid());
        assert_eq!(ProofCode::ProofFalseSign.code(), 4);
        assert_round_trip_eq(&bitmap);
    }
}
