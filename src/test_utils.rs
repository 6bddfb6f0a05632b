//! Common test utilities

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

/// Key material for small in-process surveys.
pub mod fixtures {
    use ark_ec::CurveGroup;
    use ark_std::rand::Rng;

    use crate::elgamal::KeyPair;
    use crate::query::{Roster, ServerIdentity};

    /// `count` computing nodes named `cn0..` with fresh ElGamal keys.
    pub fn computing_nodes<C: CurveGroup, R: Rng>(
        count: usize,
        rng: &mut R,
    ) -> (Vec<KeyPair<C>>, Roster<C>) {
        let keys: Vec<KeyPair<C>> = (0..count).map(|_| KeyPair::random(rng)).collect();
        let roster = Roster::new(
            keys.iter()
                .enumerate()
                .map(|(i, pair)| ServerIdentity::new(format!("cn{i}"), pair.public_key))
                .collect(),
        );
        (keys, roster)
    }
}
