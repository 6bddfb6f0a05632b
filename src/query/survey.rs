use std::collections::BTreeMap;

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

use super::Operation;
use crate::proofs::{PublishSignatureBytes, RangeBounds};

/// Participant address and public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ServerIdentity<C: CurveGroup> {
    pub id: String,
    #[serde(with = "crate::crypto_serde::curve")]
    pub public: C,
}

impl<C: CurveGroup> ServerIdentity<C> {
    pub fn new(id: impl Into<String>, public: C) -> Self {
        Self {
            id: id.into(),
            public,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct Roster<C: CurveGroup> {
    pub list: Vec<ServerIdentity<C>>,
}

impl<C: CurveGroup> Roster<C> {
    pub fn new(list: Vec<ServerIdentity<C>>) -> Self {
        Self { list }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Collective key: the sum of every member's public key.
    pub fn aggregate(&self) -> C {
        self.list.iter().map(|member| member.public).sum()
    }

    pub fn find(&self, id: &str) -> Option<&ServerIdentity<C>> {
        self.list.iter().find(|member| member.id == id)
    }
}

/// Laplace noise parameters; all zero disables differential privacy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDiffP {
    pub lap_mean: f64,
    pub lap_scale: f64,
    pub noise_list_size: usize,
    pub quanta: f64,
    pub scale: f64,
    pub limit: f64,
}

impl QueryDiffP {
    pub fn is_enabled(&self) -> bool {
        !(self.lap_mean == 0.0
            && self.lap_scale == 0.0
            && self.noise_list_size == 0
            && self.quanta == 0.0
            && self.scale == 0.0
            && self.limit == 0.0)
    }
}

/// How data providers generate synthetic rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDPDataGen {
    /// Number of categories per group-by attribute.
    pub group_by_values: Vec<i64>,
    pub generate_rows: i64,
    pub generate_data_min: i64,
    pub generate_data_max: i64,
}

/// Range-proof credentials indexed `[verifier][output slot]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct QueryIVSigs<E: Pairing> {
    pub input_validation_sigs: Option<Vec<Vec<PublishSignatureBytes<E>>>>,
    pub input_validation_size1: usize,
    pub input_validation_size2: usize,
}

impl<E: Pairing> Default for QueryIVSigs<E> {
    fn default() -> Self {
        Self {
            input_validation_sigs: None,
            input_validation_size1: 0,
            input_validation_size2: 0,
        }
    }
}

impl<E: Pairing> QueryIVSigs<E> {
    pub fn new(sigs: Vec<Vec<PublishSignatureBytes<E>>>) -> Self {
        let size1 = sigs.len();
        let size2 = sigs.first().map_or(0, Vec::len);
        Self {
            input_validation_sigs: Some(sigs),
            input_validation_size1: size1,
            input_validation_size2: size2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Query<E: Pairing> {
    pub operation: Operation,
    /// `[u, L]` per output slot.
    pub ranges: Option<Vec<RangeBounds>>,
    /// `0` without proofs, `1` with.
    pub proofs: i64,
    pub obfuscation: bool,
    pub diff_p: QueryDiffP,
    pub dp_data_gen: QueryDPDataGen,
    pub iv_sigs: QueryIVSigs<E>,
    pub roster_vns: Option<Roster<E::G1>>,
    pub cutting_factor: usize,
    /// Column names a file-backed provider reads, one per input row.
    #[serde(default)]
    pub selector: Vec<String>,
}

impl<E: Pairing> Query<E> {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            ranges: None,
            proofs: 0,
            obfuscation: false,
            diff_p: QueryDiffP::default(),
            dp_data_gen: QueryDPDataGen::default(),
            iv_sigs: QueryIVSigs::default(),
            roster_vns: None,
            cutting_factor: 0,
            selector: Vec::new(),
        }
    }
}

/// A query together with its participants and verification thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SurveyQuery<E: Pairing> {
    pub survey_id: String,
    pub roster_servers: Roster<E::G1>,
    #[serde(with = "crate::crypto_serde::curve")]
    pub client_pub_key: E::G1,
    pub intra_message: bool,
    /// Data providers attached to each computing node.
    pub server_to_dp: BTreeMap<String, Option<Vec<ServerIdentity<E::G1>>>>,
    pub query: Query<E>,
    #[serde(with = "crate::crypto_serde::curve_map")]
    pub id_to_public: BTreeMap<String, E::G1>,
    /// Probability that an arriving proof gets verified.
    pub threshold: f64,
    pub aggregation_proof_threshold: f64,
    pub obfuscation_proof_threshold: f64,
    pub range_proof_threshold: f64,
    pub key_switching_proof_threshold: f64,
}

impl<E: Pairing> SurveyQuery<E> {
    pub fn new(
        survey_id: impl Into<String>,
        roster_servers: Roster<E::G1>,
        client_pub_key: E::G1,
        query: Query<E>,
    ) -> Self {
        Self {
            survey_id: survey_id.into(),
            roster_servers,
            client_pub_key,
            intra_message: false,
            server_to_dp: BTreeMap::new(),
            query,
            id_to_public: BTreeMap::new(),
            threshold: 0.0,
            aggregation_proof_threshold: 0.0,
            obfuscation_proof_threshold: 0.0,
            range_proof_threshold: 0.0,
            key_switching_proof_threshold: 0.0,
        }
    }

    /// Registers a participant's signing key under its identifier.
    pub fn register(&mut self, identity: &ServerIdentity<E::G1>) {
        self.id_to_public
            .insert(identity.id.clone(), identity.public);
    }
}
