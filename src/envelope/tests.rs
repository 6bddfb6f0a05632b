use super::*;
use crate::elgamal::{CipherVector, Ciphertext, KeyPair, ProcessResponse, ResponseAllDPs};
use crate::proofs::{
    create_predicate_range_proof_list, init_range_proof_signature, server_aggregation_proof_creation,
    shuffle_sequence, shuffling_proof_creation, CreateProof,
};
use crate::query::{choose_operation, Query, QueryIVSigs, ServerIdentity};
use crate::signing::SurveyScheme;
use crate::test_utils::fixtures::computing_nodes;
use ark_bn254::{Bn254, G1Projective};
use ark_crypto_primitives::signature::SignatureScheme;
use ark_ec::PrimeGroup;
use ark_std::test_rng;

type E = Bn254;
type Curve = G1Projective;

struct Fixture {
    suite: Suite<E>,
    params: SurveyParameters<Curve>,
    signer: RequestSigner<Curve>,
    survey: SurveyQuery<E>,
}

fn fixture(rng: &mut impl Rng) -> Fixture {
    let suite = Suite::<E>::new();
    let params = SurveyScheme::<Curve>::setup(rng).unwrap();
    let (nodes, roster) = computing_nodes::<Curve, _>(2, rng);
    let signer = RequestSigner::generate("cn0", &params, rng).unwrap();

    let mut query = Query::new(choose_operation("sum", 0, 10, 0, 0).unwrap());
    query.proofs = 1;
    let mut survey = SurveyQuery::new("survey-1", roster, nodes[0].public_key, query);
    survey.register(&ServerIdentity::new(signer.id.clone(), signer.public_key));
    survey.threshold = 1.0;
    survey.range_proof_threshold = 1.0;
    survey.aggregation_proof_threshold = 1.0;
    Fixture {
        suite,
        params,
        signer,
        survey,
    }
}

fn aggregation_request(fx: &Fixture, corrupt: bool, rng: &mut impl Rng) -> ProofRequest<Curve> {
    let key = fx.survey.roster_servers.aggregate();
    let mut dps = ResponseAllDPs::default();
    dps.push("all", CipherVector::encrypt(key, &[1, 2, 3], rng));
    dps.push("all", CipherVector::encrypt(key, &[4, 5, 6], rng));
    let mut aggregated = ResponseAllDPs::from_groups(dps.group_sum().unwrap());
    if corrupt {
        aggregated.data[0].data.0[0] =
            &aggregated.data[0].data.0[0] + &Ciphertext::encrypt_int(key, 1, rng);
    }
    let payload = ProofPayload::<E>::Aggregation(vec![server_aggregation_proof_creation(dps, aggregated)]);
    ProofRequest::from_payload(
        &payload,
        fx.survey.survey_id.clone(),
        "",
        fx.survey.roster_servers.clone(),
        vec![0xAB; 4],
        &fx.params,
        &fx.signer,
        rng,
    )
    .unwrap()
}

#[test]
fn honest_request_verifies_and_survives_serde() {
    let mut rng = test_rng();
    let fx = fixture(&mut rng);
    let request = aggregation_request(&fx, false, &mut rng);
    let code = request.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng);
    assert_eq!(code, ProofCode::ProofTrue);

    let json = serde_json::to_string(&request).unwrap();
    let decoded: ProofRequest<Curve> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.body(), request.body());
    let code = decoded.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng);
    assert_eq!(code, ProofCode::ProofTrue);
}

#[test]
fn invalid_proof_and_tampered_request_are_distinguished() {
    let mut rng = test_rng();
    let fx = fixture(&mut rng);
    let bad = aggregation_request(&fx, true, &mut rng);
    assert_eq!(
        bad.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalse
    );

    let mut tampered = aggregation_request(&fx, false, &mut rng);
    tampered.message.value.differ_info = "other".into();
    assert_eq!(
        tampered.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalseSign
    );

    let good = aggregation_request(&fx, false, &mut rng);
    let stranger = RequestSigner::<Curve>::generate("cn9", &fx.params, &mut rng).unwrap();
    assert_eq!(
        good.verify(&fx.suite, &fx.params, &stranger.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalseSign
    );
}

#[test]
fn sampled_out_requests_are_only_received() {
    let mut rng = test_rng();
    let mut fx = fixture(&mut rng);
    fx.survey.threshold = 0.0;
    let request = aggregation_request(&fx, true, &mut rng);
    assert_eq!(
        request.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofReceived
    );
}

#[test]
fn undecodable_payload_is_false_not_false_sign() {
    let mut rng = test_rng();
    let fx = fixture(&mut rng);
    let body = ProofRequestBody::new(
        ProofKind::KeySwitch,
        "survey-1",
        "cn0",
        "",
        vec![1, 2, 3],
        fx.survey.roster_servers.clone(),
        Vec::new(),
    )
    .with_previous("cn1");
    let request = ProofRequest::new(body, &fx.params, &fx.signer, &mut rng).unwrap();
    assert!(matches!(
        request.payload::<E>(),
        Err(VerifyError::MalformedPayload(_))
    ));
    assert_eq!(
        request.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalse
    );
}

#[test]
fn range_request_checks_against_query_credentials() {
    let mut rng = test_rng();
    let mut fx = fixture(&mut rng);
    let sigs: Vec<_> = (0..2)
        .map(|_| init_range_proof_signature(&fx.suite, 2, &mut rng).unwrap())
        .collect();
    fx.survey.query.ranges = Some(vec![(2, 4)]);
    fx.survey.query.iv_sigs = QueryIVSigs::new(sigs.iter().map(|s| vec![s.clone()]).collect());

    let key = fx.survey.roster_servers.aggregate();
    let (cipher, r) = Ciphertext::encrypt_int_get_r(key, 11, &mut rng);
    let cp = CreateProof {
        sigs: sigs.iter().map(|s| s.to_signature().unwrap()).collect(),
        u: 2,
        l: 4,
        secret: 11,
        r,
        ca_pub: key,
        cipher,
    };
    let list = create_predicate_range_proof_list(&fx.suite, &[cp], &mut rng, None).unwrap();
    let request = ProofRequest::from_payload(
        &ProofPayload::<E>::Range(list),
        "survey-1",
        "dp0-slot0",
        fx.survey.roster_servers.clone(),
        Vec::new(),
        &fx.params,
        &fx.signer,
        &mut rng,
    )
    .unwrap();
    assert_eq!(
        request.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofTrue
    );

    fx.survey.query.ranges = Some(vec![(2, 3)]);
    assert_eq!(
        request.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalse
    );
}

#[test]
fn survey_verifier_fills_bitmap() {
    let mut rng = test_rng();
    let fx = fixture(&mut rng);
    let request = aggregation_request(&fx, false, &mut rng);
    let verifier = SurveyVerifier::new(fx.suite, fx.survey.clone(), fx.params.clone(), 7);

    assert_eq!(verifier.bitmap().expected(ProofKind::Aggregation), 2);
    assert_eq!(verifier.handle(&request), Ok(ProofCode::ProofTrue));
    assert_eq!(verifier.handle(&request), Err(VerifyError::Duplicate));

    let bitmap = verifier.bitmap();
    assert_eq!(bitmap.get(&request.key()), Some(ProofCode::ProofTrue));
    assert_eq!(bitmap.missing(ProofKind::Aggregation), 1);
    assert!(!bitmap.is_complete());

    let stranger = RequestSigner::<Curve>::generate("cn1", &fx.params, &mut rng).unwrap();
    let mut body = aggregation_request(&fx, false, &mut rng).body().clone();
    body.sender_id = "cn1".into();
    let from_stranger = ProofRequest::new(body, &fx.params, &stranger, &mut rng).unwrap();
    assert_eq!(
        verifier.handle(&from_stranger),
        Err(VerifyError::UnknownSender("cn1".into()))
    );

    verifier.register_sender("cn1", stranger.public_key);
    assert_eq!(verifier.handle(&from_stranger), Ok(ProofCode::ProofTrue));
    assert_eq!(verifier.bitmap().missing(ProofKind::Aggregation), 0);

    let mut elsewhere = aggregation_request(&fx, false, &mut rng);
    elsewhere.message.value.survey_id = "survey-2".into();
    assert!(matches!(
        verifier.handle(&elsewhere),
        Err(VerifyError::SurveyMismatch { .. })
    ));
}

fn shuffle_request(fx: &Fixture, h: Curve, rng: &mut impl Rng) -> ProofRequest<Curve> {
    let key = fx.survey.roster_servers.aggregate();
    let g = Curve::generator();
    let list: Vec<_> = (0..3)
        .map(|i| ProcessResponse::from_attributes(CipherVector::encrypt(key, &[i], rng)))
        .collect();
    let (shuffled, pi, beta) = shuffle_sequence(&list, g, h, None, rng).unwrap();
    let proof = shuffling_proof_creation(&list, &shuffled, g, h, &beta, &pi, rng, None).unwrap();
    ProofRequest::from_payload(
        &ProofPayload::<E>::Shuffle(proof),
        fx.survey.survey_id.clone(),
        "",
        fx.survey.roster_servers.clone(),
        Vec::new(),
        &fx.params,
        &fx.signer,
        rng,
    )
    .unwrap()
}

#[test]
fn shuffle_must_rerandomize_under_collective_key() {
    let mut rng = test_rng();
    let fx = fixture(&mut rng);
    let collective = fx.survey.roster_servers.aggregate();
    let honest = shuffle_request(&fx, collective, &mut rng);
    assert_eq!(
        honest.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofTrue
    );

    let foreign = KeyPair::<Curve>::random(&mut rng).public_key;
    let rekeyed = shuffle_request(&fx, foreign, &mut rng);
    let payload = rekeyed.payload::<E>().unwrap();
    match &payload {
        ProofPayload::Shuffle(proof) => assert!(shuffling_proof_verification(proof, collective)),
        _ => unreachable!(),
    }
    assert_eq!(
        rekeyed.verify(&fx.suite, &fx.params, &fx.signer.public_key, &fx.survey, &mut rng),
        ProofCode::ProofFalse
    );
}
