use std::collections::HashMap;

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use super::{BitmapKey, ProofCode, ProofRequest, VerificationBitmap, LOG_TARGET};
use crate::query::{query_to_proofs_nbrs, SurveyQuery};
use crate::signing::SurveyParameters;
use crate::suite::Suite;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("unknown sender {0}")]
    UnknownSender(String),
    #[error("invalid signature")]
    BadSignature,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("request for survey {got}, verifier runs {expected}")]
    SurveyMismatch { expected: String, got: String },
    #[error("proof already recorded")]
    Duplicate,
}

pub trait ProofVerifier<C>
where
    C: CurveGroup,
{
    /// Checks one request and records its outcome.
    fn handle(&self, request: &ProofRequest<C>) -> Result<ProofCode, VerifyError>;
}

/// Verifying node state for one survey.
pub struct SurveyVerifier<E: Pairing> {
    suite: Suite<E>,
    survey: SurveyQuery<E>,
    params: SurveyParameters<E::G1>,
    senders: RwLock<HashMap<String, E::G1>>,
    bitmap: RwLock<VerificationBitmap>,
    rng: Mutex<StdRng>,
}

impl<E: Pairing> SurveyVerifier<E> {
    /// Starts with the survey's registered signing keys and one empty slot
    /// per expected proof.
    pub fn new(
        suite: Suite<E>,
        survey: SurveyQuery<E>,
        params: SurveyParameters<E::G1>,
        rng_seed: u64,
    ) -> Self {
        let senders = survey
            .id_to_public
            .iter()
            .map(|(id, pk)| (id.clone(), *pk))
            .collect();
        let bitmap = VerificationBitmap::new(query_to_proofs_nbrs(&survey));
        Self {
            suite,
            survey,
            params,
            senders: RwLock::new(senders),
            bitmap: RwLock::new(bitmap),
            rng: Mutex::new(StdRng::seed_from_u64(rng_seed)),
        }
    }

    pub fn register_sender(&self, id: impl Into<String>, public_key: E::G1) {
        self.senders.write().insert(id.into(), public_key);
    }

    pub fn survey(&self) -> &SurveyQuery<E> {
        &self.survey
    }

    pub fn bitmap(&self) -> VerificationBitmap {
        self.bitmap.read().clone()
    }
}

impl<E: Pairing> ProofVerifier<E::G1> for SurveyVerifier<E> {
    fn handle(&self, request: &ProofRequest<E::G1>) -> Result<ProofCode, VerifyError> {
        let body = request.body();
        if body.survey_id != self.survey.survey_id {
            return Err(VerifyError::SurveyMismatch {
                expected: self.survey.survey_id.clone(),
                got: body.survey_id.clone(),
            });
        }
        let sender_pk = self
            .senders
            .read()
            .get(&body.sender_id)
            .copied()
            .ok_or_else(|| VerifyError::UnknownSender(body.sender_id.clone()))?;

        let key: BitmapKey = request.key();
        if self.bitmap.read().get(&key).is_some() {
            return Err(VerifyError::Duplicate);
        }

        let code = {
            let mut rng = self.rng.lock();
            request.verify(&self.suite, &self.params, &sender_pk, &self.survey, &mut *rng)
        };
        tracing::info!(
            target: LOG_TARGET,
            survey = %body.survey_id,
            sender = %body.sender_id,
            kind = %body.kind,
            code = code.code(),
            "proof request handled"
        );
        self.bitmap.write().record(key, code);
        Ok(code)
    }
}
