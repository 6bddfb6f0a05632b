use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;

#[derive(Clone, Debug)]
pub struct KeyPair<C: CurveGroup> {
    pub secret_key: C::ScalarField,
    pub public_key: C,
}

impl<C: CurveGroup> KeyPair<C> {
    pub fn new(secret_key: C::ScalarField) -> Self {
        let public_key = C::generator() * secret_key;
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::new(C::ScalarField::rand(rng))
    }
}

/// Collective key: the sum of every computing node's public key.
pub fn aggregate_key<C: CurveGroup>(public_keys: &[C]) -> C {
    public_keys.iter().fold(C::zero(), |acc, pk| acc + pk)
}
