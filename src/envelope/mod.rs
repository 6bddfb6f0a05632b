//! Signed proof requests: every published proof travels to the verifying
//! nodes inside one of these, and each verifier turns it into a bitmap entry.

mod bitmap;
mod verifier;

use std::fmt;

use ark_ec::pairing::Pairing;
use ark_ec::{CurveGroup, PrimeGroup};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use bitmap::{BitmapKey, VerificationBitmap};
pub use verifier::{ProofVerifier, SurveyVerifier, VerifyError};

use crate::error::ProofResult;
use crate::proofs::{
    aggregation_list_from_bytes, aggregation_list_to_bytes, range_proof_list_verification,
    server_aggregation_list_proof_verification, shuffling_proof_verification,
    key_switch_list_proof_verification, obfuscation_list_proof_verification,
    PublishedAggregationProof, PublishedKSListProof, PublishedListObfuscationProof,
    PublishedShufflingProof, RangeProofList,
};
use crate::query::{Roster, SurveyQuery};
use crate::signing::{
    RequestSigner, Signable, SignatureBytes, SurveyParameters, TranscriptBuilder, WithSignature,
};
use crate::suite::Suite;

const LOG_TARGET: &str = "drynx_proofs::envelope";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Range,
    Shuffle,
    Aggregation,
    Obfuscation,
    KeySwitch,
}

impl ProofKind {
    /// Same order as the proof counts of a survey.
    pub const ALL: [ProofKind; 5] = [
        ProofKind::Range,
        ProofKind::Shuffle,
        ProofKind::Aggregation,
        ProofKind::Obfuscation,
        ProofKind::KeySwitch,
    ];

    pub fn index(self) -> usize {
        match self {
            ProofKind::Range => 0,
            ProofKind::Shuffle => 1,
            ProofKind::Aggregation => 2,
            ProofKind::Obfuscation => 3,
            ProofKind::KeySwitch => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProofKind::Range => "range",
            ProofKind::Shuffle => "shuffle",
            ProofKind::Aggregation => "aggregation",
            ProofKind::Obfuscation => "obfuscation",
            ProofKind::KeySwitch => "key_switch",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome recorded for one expected proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProofCode {
    ProofFalse = 0,
    ProofTrue = 1,
    /// Signature checked but the proof was sampled out.
    ProofReceived = 2,
    ProofNotReceived = 3,
    ProofFalseSign = 4,
}

impl ProofCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Anything but a failed proof or signature.
    pub fn is_acceptable(self) -> bool {
        matches!(self, ProofCode::ProofTrue | ProofCode::ProofReceived)
    }
}

impl From<bool> for ProofCode {
    fn from(valid: bool) -> Self {
        if valid {
            ProofCode::ProofTrue
        } else {
            ProofCode::ProofFalse
        }
    }
}

/// A decoded proof body, one variant per [`ProofKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofPayload<E: Pairing> {
    Range(RangeProofList<E>),
    Shuffle(PublishedShufflingProof<E::G1>),
    Aggregation(Vec<PublishedAggregationProof<E::G1>>),
    Obfuscation(PublishedListObfuscationProof<E::G1>),
    KeySwitch(PublishedKSListProof<E::G1>),
}

impl<E: Pairing> ProofPayload<E> {
    pub fn kind(&self) -> ProofKind {
        match self {
            ProofPayload::Range(_) => ProofKind::Range,
            ProofPayload::Shuffle(_) => ProofKind::Shuffle,
            ProofPayload::Aggregation(_) => ProofKind::Aggregation,
            ProofPayload::Obfuscation(_) => ProofKind::Obfuscation,
            ProofPayload::KeySwitch(_) => ProofKind::KeySwitch,
        }
    }

    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        match self {
            ProofPayload::Range(list) => list.to_bytes(),
            ProofPayload::Shuffle(proof) => proof.to_bytes(),
            ProofPayload::Aggregation(list) => aggregation_list_to_bytes(list),
            ProofPayload::Obfuscation(list) => list.to_bytes(),
            ProofPayload::KeySwitch(list) => list.to_bytes(),
        }
    }

    pub fn from_bytes(kind: ProofKind, bytes: &[u8]) -> ProofResult<Self> {
        Ok(match kind {
            ProofKind::Range => ProofPayload::Range(RangeProofList::from_bytes(bytes)?),
            ProofKind::Shuffle => ProofPayload::Shuffle(PublishedShufflingProof::from_bytes(bytes)?),
            ProofKind::Aggregation => ProofPayload::Aggregation(aggregation_list_from_bytes(bytes)?),
            ProofKind::Obfuscation => {
                ProofPayload::Obfuscation(PublishedListObfuscationProof::from_bytes(bytes)?)
            }
            ProofKind::KeySwitch => ProofPayload::KeySwitch(PublishedKSListProof::from_bytes(bytes)?),
        })
    }

    /// Runs the proof's own verifier with the survey's inside threshold.
    pub fn verify(&self, suite: &Suite<E>, survey: &SurveyQuery<E>) -> bool {
        let collective_key = survey.roster_servers.aggregate();
        match self {
            ProofPayload::Range(list) => {
                let ranges = survey.query.ranges.as_deref().unwrap_or(&[]);
                let sigs = survey
                    .query
                    .iv_sigs
                    .input_validation_sigs
                    .as_deref()
                    .unwrap_or(&[]);
                range_proof_list_verification(
                    suite,
                    list,
                    ranges,
                    sigs,
                    collective_key,
                    survey.range_proof_threshold,
                )
            }
            ProofPayload::Shuffle(proof) => {
                // Rerandomization must stay under the survey's own key.
                if proof.g != E::G1::generator() || proof.h != collective_key {
                    tracing::debug!(target: LOG_TARGET, "shuffle bases differ from the survey keys");
                    return false;
                }
                shuffling_proof_verification(proof, collective_key)
            }
            ProofPayload::Aggregation(list) => {
                server_aggregation_list_proof_verification(list, survey.aggregation_proof_threshold)
            }
            ProofPayload::Obfuscation(list) => {
                obfuscation_list_proof_verification(list, survey.obfuscation_proof_threshold)
            }
            ProofPayload::KeySwitch(list) => {
                key_switch_list_proof_verification(list, survey.key_switching_proof_threshold)
            }
        }
    }
}

/// Signed part of a proof request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProofRequestBody<C: CurveGroup> {
    pub kind: ProofKind,
    pub survey_id: String,
    pub sender_id: String,
    /// Disambiguates several proofs of one kind from the same sender.
    pub differ_info: String,
    #[serde(with = "crate::crypto_serde::bytes")]
    pub data: Vec<u8>,
    /// Verifying nodes the request is routed to.
    pub roster: Roster<C>,
    /// Ledger head the sender saw when publishing.
    #[serde(with = "crate::crypto_serde::bytes")]
    pub sb: Vec<u8>,
    /// Previous shuffler or key switcher in the chain.
    pub previous: Option<String>,
}

impl<C: CurveGroup> ProofRequestBody<C> {
    pub fn new(
        kind: ProofKind,
        survey_id: impl Into<String>,
        sender_id: impl Into<String>,
        differ_info: impl Into<String>,
        data: Vec<u8>,
        roster: Roster<C>,
        sb: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            survey_id: survey_id.into(),
            sender_id: sender_id.into(),
            differ_info: differ_info.into(),
            data,
            roster,
            sb,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }
}

impl<C: CurveGroup> Signable for ProofRequestBody<C> {
    fn domain_kind(&self) -> &'static str {
        "envelope/proof_request_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u8(self.kind.index() as u8);
        builder.append_str(&self.survey_id);
        builder.append_str(&self.sender_id);
        builder.append_str(&self.differ_info);
        builder.append_bytes(&self.data);
        builder.append_u64(self.roster.len() as u64);
        for member in &self.roster.list {
            builder.append_str(&member.id);
            builder.append_curve(&member.public);
        }
        builder.append_bytes(&self.sb);
        self.previous.clone().write_transcript(builder);
    }
}

/// A proof request as it travels on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProofRequest<C: CurveGroup> {
    pub message: WithSignature<SignatureBytes, ProofRequestBody<C>>,
}

impl<C: CurveGroup> ProofRequest<C> {
    pub fn new<R: Rng>(
        body: ProofRequestBody<C>,
        params: &SurveyParameters<C>,
        signer: &RequestSigner<C>,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            message: signer.sign(params, body, rng)?,
        })
    }

    pub fn body(&self) -> &ProofRequestBody<C> {
        &self.message.value
    }

    pub fn key(&self) -> BitmapKey {
        let body = self.body();
        BitmapKey::new(body.sender_id.clone(), body.kind, body.differ_info.clone())
    }

    pub fn check_signature(
        &self,
        params: &SurveyParameters<C>,
        sender_pk: &C,
    ) -> Result<(), VerifyError> {
        match self.message.verify_detached(params, sender_pk) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerifyError::BadSignature),
            Err(err) => {
                tracing::debug!(target: LOG_TARGET, %err, "undecodable signature");
                Err(VerifyError::BadSignature)
            }
        }
    }

    /// Encodes `payload` and signs it under `signer`'s identity.
    #[allow(clippy::too_many_arguments)]
    pub fn from_payload<E, R>(
        payload: &ProofPayload<E>,
        survey_id: impl Into<String>,
        differ_info: impl Into<String>,
        roster: Roster<C>,
        sb: Vec<u8>,
        params: &SurveyParameters<C>,
        signer: &RequestSigner<C>,
        rng: &mut R,
    ) -> anyhow::Result<Self>
    where
        E: Pairing<G1 = C>,
        R: Rng,
    {
        let body = ProofRequestBody::new(
            payload.kind(),
            survey_id,
            signer.id.clone(),
            differ_info,
            payload.to_bytes()?,
            roster,
            sb,
        );
        Self::new(body, params, signer, rng)
    }

    pub fn payload<E: Pairing<G1 = C>>(&self) -> Result<ProofPayload<E>, VerifyError> {
        let body = self.body();
        ProofPayload::from_bytes(body.kind, &body.data).map_err(|err| {
            tracing::debug!(target: LOG_TARGET, kind = %body.kind, %err, "undecodable proof payload");
            VerifyError::MalformedPayload(err.to_string())
        })
    }

    /// Signature first; then, when the draw falls below the survey threshold,
    /// the proof itself.
    pub fn verify<E, R>(
        &self,
        suite: &Suite<E>,
        params: &SurveyParameters<C>,
        sender_pk: &C,
        survey: &SurveyQuery<E>,
        rng: &mut R,
    ) -> ProofCode
    where
        E: Pairing<G1 = C>,
        R: Rng,
    {
        let body = self.body();
        if self.check_signature(params, sender_pk).is_err() {
            tracing::debug!(target: LOG_TARGET, sender = %body.sender_id, kind = %body.kind, "bad signature");
            return ProofCode::ProofFalseSign;
        }
        let draw: f64 = rng.gen();
        if draw >= survey.threshold {
            tracing::debug!(target: LOG_TARGET, sender = %body.sender_id, kind = %body.kind, draw, "sampled out");
            return ProofCode::ProofReceived;
        }
        let code = match self.payload::<E>() {
            Ok(payload) => ProofCode::from(payload.verify(suite, survey)),
            Err(_) => ProofCode::ProofFalse,
        };
        tracing::debug!(target: LOG_TARGET, sender = %body.sender_id, kind = %body.kind, ?code, "proof checked");
        code
    }
}

#[cfg(test)]
mod tests;
