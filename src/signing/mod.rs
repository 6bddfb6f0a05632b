use anyhow::Result;
use ark_crypto_primitives::signature::{
    schnorr::{Schnorr, Signature as SchnorrSignature},
    SignatureScheme,
};
use ark_ec::CurveGroup;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const DOMAIN_TAG: &[u8] = b"drynx/proof-request/v1";

/// Schnorr over the ElGamal base group, used to sign proof requests.
pub type SurveyScheme<C> = Schnorr<C, Sha256>;
pub type SurveyParameters<C> = <SurveyScheme<C> as SignatureScheme>::Parameters;
pub type SurveySecretKey<C> = <SurveyScheme<C> as SignatureScheme>::SecretKey;

/// Detached signature bytes as carried inside envelopes.
pub type SignatureBytes = Vec<u8>;

/// Builder for canonical signing transcripts.
pub struct TranscriptBuilder {
    buffer: Vec<u8>,
}

impl TranscriptBuilder {
    pub fn new(kind: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(128);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(kind.len() as u16).to_be_bytes());
        buffer.extend_from_slice(kind.as_bytes());
        Self { buffer }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn append_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn append_str(&mut self, value: &str) {
        self.append_bytes(value.as_bytes());
    }

    /// Appends the compressed encoding of a point or scalar.
    pub fn append_curve<T: CanonicalSerialize>(&mut self, value: &T) {
        let mut bytes = Vec::with_capacity(value.compressed_size());
        value
            .serialize_compressed(&mut bytes)
            .expect("curve serialization");
        self.append_bytes(&bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Values that can be signed into a canonical transcript.
pub trait Signable {
    /// Logical kind string used for domain separation.
    fn domain_kind(&self) -> &'static str;

    /// Append this value's canonical representation into the transcript builder.
    fn write_transcript(&self, builder: &mut TranscriptBuilder);

    /// Obtain canonical signing bytes.
    fn to_signing_bytes(&self) -> Vec<u8> {
        let mut builder = TranscriptBuilder::new(self.domain_kind());
        self.write_transcript(&mut builder);
        builder.finish()
    }
}

/// A signed value together with the exact transcript bytes that were signed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithSignature<Sig, T>
where
    T: Signable,
{
    pub value: T,
    pub signature: Sig,
    /// Canonical bytes used for signing/verification.
    pub transcript: Vec<u8>,
}

impl<Sig, T> WithSignature<Sig, T>
where
    T: Signable,
{
    /// Signs `value.to_signing_bytes()` with the provided scheme.
    pub fn new<S, R>(
        value: T,
        params: &S::Parameters,
        sk: &S::SecretKey,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: SignatureScheme<Signature = Sig>,
        R: rand::Rng,
    {
        let transcript = value.to_signing_bytes();

        let signature = S::sign(params, sk, &transcript, rng)
            .map_err(|e| anyhow::anyhow!("signature error: {e}"))?;

        Ok(WithSignature {
            value,
            signature,
            transcript,
        })
    }

    /// Verifies the signature and that the stored transcript still matches the value.
    pub fn verify<S>(&self, params: &S::Parameters, pk: &S::PublicKey) -> Result<bool>
    where
        S: SignatureScheme<Signature = Sig>,
    {
        if self.transcript != self.value.to_signing_bytes() {
            return Ok(false);
        }
        S::verify(params, pk, &self.transcript, &self.signature)
            .map_err(|e| anyhow::anyhow!("signature error: {e}"))
    }
}

/// Detached byte form of a signature, for logging and wire framing.
pub trait SignatureEncoder {
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

impl<C> SignatureEncoder for SchnorrSignature<C>
where
    C: CurveGroup,
    C::ScalarField: CanonicalSerialize,
{
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.prover_response
            .serialize_compressed(&mut bytes)
            .map_err(|err| anyhow::anyhow!("signature serialization error: {err}"))?;
        self.verifier_challenge
            .serialize_compressed(&mut bytes)
            .map_err(|err| anyhow::anyhow!("signature serialization error: {err}"))?;
        Ok(bytes)
    }
}

/// Inverse of [`SignatureEncoder::to_bytes`] for Schnorr signatures.
pub fn decode_signature<C: CurveGroup>(bytes: &[u8]) -> Result<SchnorrSignature<C>> {
    let mut cursor = bytes;
    let prover_response = C::ScalarField::deserialize_compressed(&mut cursor)
        .map_err(|err| anyhow::anyhow!("signature decoding error: {err}"))?;
    let verifier_challenge = C::ScalarField::deserialize_compressed(&mut cursor)
        .map_err(|err| anyhow::anyhow!("signature decoding error: {err}"))?;
    if !cursor.is_empty() {
        return Err(anyhow::anyhow!(
            "signature decoding error: {} trailing bytes",
            cursor.len()
        ));
    }
    Ok(SchnorrSignature {
        prover_response,
        verifier_challenge,
    })
}

/// A participant's Schnorr identity used to sign outgoing proof requests.
#[derive(Clone)]
pub struct RequestSigner<C: CurveGroup> {
    pub id: String,
    pub public_key: C,
    secret_key: SurveySecretKey<C>,
}

impl<C: CurveGroup> RequestSigner<C> {
    pub fn generate<R: Rng>(
        id: impl Into<String>,
        params: &SurveyParameters<C>,
        rng: &mut R,
    ) -> Result<Self> {
        let (public_key, secret_key) = SurveyScheme::<C>::keygen(params, rng)
            .map_err(|e| anyhow::anyhow!("key generation error: {e}"))?;
        Ok(Self {
            id: id.into(),
            public_key: public_key.into(),
            secret_key,
        })
    }

    /// Signs `value` and stores the signature in its detached byte form.
    pub fn sign<T, R>(
        &self,
        params: &SurveyParameters<C>,
        value: T,
        rng: &mut R,
    ) -> Result<WithSignature<SignatureBytes, T>>
    where
        T: Signable,
        R: Rng,
    {
        let signed = WithSignature::new::<SurveyScheme<C>, R>(value, params, &self.secret_key, rng)?;
        Ok(WithSignature {
            signature: signed.signature.to_bytes()?,
            value: signed.value,
            transcript: signed.transcript,
        })
    }
}

impl<T: Signable> WithSignature<SignatureBytes, T> {
    /// Verifies a detached Schnorr signature against `public_key`.
    pub fn verify_detached<C: CurveGroup>(
        &self,
        params: &SurveyParameters<C>,
        public_key: &C,
    ) -> Result<bool> {
        if self.transcript != self.value.to_signing_bytes() {
            return Ok(false);
        }
        let signature = decode_signature::<C>(&self.signature)?;
        SurveyScheme::<C>::verify(params, &public_key.into_affine(), &self.transcript, &signature)
            .map_err(|e| anyhow::anyhow!("signature error: {e}"))
    }
}

impl Signable for u64 {
    fn domain_kind(&self) -> &'static str {
        "primitive/u64_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(*self);
    }
}

impl Signable for String {
    fn domain_kind(&self) -> &'static str {
        "primitive/string_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_str(self);
    }
}

impl<T> Signable for Option<T>
where
    T: Signable,
{
    fn domain_kind(&self) -> &'static str {
        "option/v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        match self {
            Some(value) => {
                builder.append_u8(1);
                value.write_transcript(builder);
            }
            None => builder.append_u8(0),
        }
    }
}

impl<T> Signable for Vec<T>
where
    T: Signable,
{
    fn domain_kind(&self) -> &'static str {
        "collection/vec_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.len() as u64);
        for item in self {
            item.write_transcript(builder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::G1Projective;
    use ark_std::test_rng;

    type Scheme = SurveyScheme<G1Projective>;

    #[test]
    fn signed_value_verifies_and_detects_tampering() {
        let mut rng = test_rng();
        let params = Scheme::setup(&mut rng).unwrap();
        let (pk, sk) = Scheme::keygen(&params, &mut rng).unwrap();

        let signed =
            WithSignature::new::<Scheme, _>(String::from("survey-1"), &params, &sk, &mut rng)
                .unwrap();
        assert!(signed.verify::<Scheme>(&params, &pk).unwrap());
        assert!(!signed.signature.to_bytes().unwrap().is_empty());

        let mut tampered = signed.clone();
        tampered.value = String::from("survey-2");
        assert!(!tampered.verify::<Scheme>(&params, &pk).unwrap());

        let (other_pk, _) = Scheme::keygen(&params, &mut rng).unwrap();
        assert!(!signed.verify::<Scheme>(&params, &other_pk).unwrap());
    }

    #[test]
    fn detached_signatures_round_trip() {
        let mut rng = test_rng();
        let params = Scheme::setup(&mut rng).unwrap();
        let signer = RequestSigner::<G1Projective>::generate("cn0", &params, &mut rng).unwrap();
        let other = RequestSigner::<G1Projective>::generate("cn1", &params, &mut rng).unwrap();

        let signed = signer.sign(&params, 42u64, &mut rng).unwrap();
        assert!(signed.verify_detached(&params, &signer.public_key).unwrap());
        assert!(!signed.verify_detached(&params, &other.public_key).unwrap());

        let mut truncated = signed.clone();
        truncated.signature.truncate(3);
        assert!(truncated.verify_detached(&params, &signer.public_key).is_err());
    }

    #[test]
    fn signature_bytes_decode_field_by_field() {
        let mut rng = test_rng();
        let params = Scheme::setup(&mut rng).unwrap();
        let (_, sk) = Scheme::keygen(&params, &mut rng).unwrap();
        let signature = Scheme::sign(&params, &sk, b"request", &mut rng).unwrap();

        let bytes = signature.to_bytes().unwrap();
        let decoded = decode_signature::<G1Projective>(&bytes).unwrap();
        assert_eq!(decoded.prover_response, signature.prover_response);
        assert_eq!(decoded.verifier_challenge, signature.verifier_challenge);
        assert_eq!(decoded.to_bytes().unwrap(), bytes);

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(decode_signature::<G1Projective>(&padded).is_err());
        assert!(decode_signature::<G1Projective>(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn transcripts_are_domain_separated() {
        let a = Some(7u64).to_signing_bytes();
        let b = 7u64.to_signing_bytes();
        assert_ne!(a, b);
        assert!(a.starts_with(DOMAIN_TAG));
        assert_eq!(vec![1u64, 2].to_signing_bytes(), vec![1u64, 2].to_signing_bytes());
    }
}
