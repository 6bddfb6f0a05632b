use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use ark_bn254::{Bn254, Fr as Scalar, G1Projective as Curve};
use ark_ec::PrimeGroup;
use ark_ff::{UniformRand, Zero};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use drynx_proofs::config::CoreConfig;
use drynx_proofs::diff_privacy::generate_noise_values;
use drynx_proofs::elgamal::{
    combine_share_vectors, CipherVector, Ciphertext, DiscreteLogTable, KeyPair, ProcessResponse,
    ResponseAllDPs,
};
use drynx_proofs::encoding::{decode, encode, uncut, RangeInputs};
use drynx_proofs::envelope::{ProofPayload, ProofRequest, ProofVerifier, SurveyVerifier};
use drynx_proofs::loader::{DataLoader, FileLoader, RandomLoader};
use drynx_proofs::proofs::{
    create_predicate_range_proof_list, init_range_proof_signature, key_switch_with_proof,
    obfuscation_list_proof_creation, server_aggregation_proof_creation, shuffle_sequence,
    shuffling_proof_creation, PublishSignature,
};
use drynx_proofs::query::{
    check_parameters, choose_operation, Query, QueryDiffP, QueryIVSigs, Roster, ServerIdentity,
    SurveyQuery,
};
use drynx_proofs::signing::{RequestSigner, SurveyParameters, SurveyScheme};
use drynx_proofs::suite::Suite;

use ark_crypto_primitives::signature::SignatureScheme;

type E = Bn254;

const LOG_TARGET: &str = "bin::survey_demo";
const SURVEY_ID: &str = "survey-demo";
const GROUP: &str = "all";

#[derive(Debug, Parser)]
#[command(name = "survey_demo")]
#[command(about = "Run a verified survey in-process: encode, aggregate, key switch, verify", long_about = None)]
struct Args {
    /// Operation name (sum, mean, variance, cosim, frequencyCount, min, max, union, inter, bool_AND, bool_OR, lin_reg)
    #[arg(long, env = "DRYNX_OPERATION", default_value = "sum")]
    operation: String,

    /// Smallest value the providers hold
    #[arg(long, env = "DRYNX_QUERY_MIN", default_value_t = 0)]
    min: i64,

    /// Largest value the providers hold
    #[arg(long, env = "DRYNX_QUERY_MAX", default_value_t = 10)]
    max: i64,

    /// Feature count for lin_reg
    #[arg(long, env = "DRYNX_DIMENSIONS", default_value_t = 1)]
    dimensions: usize,

    /// Replicate every provider response this many times (0 disables)
    #[arg(long, env = "DRYNX_CUTTING_FACTOR", default_value_t = 0)]
    cutting_factor: usize,

    /// Number of computing nodes
    #[arg(long, env = "DRYNX_NODES", default_value_t = 3)]
    nodes: usize,

    /// Number of data providers, spread over the computing nodes
    #[arg(long, env = "DRYNX_PROVIDERS", default_value_t = 4)]
    providers: usize,

    /// Rows each random provider generates
    #[arg(long, env = "DRYNX_ROWS", default_value_t = 10)]
    rows: i64,

    /// Tab-separated file every provider reads instead of random data
    #[arg(long, env = "DRYNX_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Comma-separated column names read from the data file
    #[arg(long, env = "DRYNX_COLUMNS", value_delimiter = ',')]
    columns: Vec<String>,

    /// Attach and verify proofs for every step
    #[arg(long, env = "DRYNX_PROOFS", default_value_t = true, action = clap::ArgAction::Set)]
    proofs: bool,

    /// Scale bit-encoded results by secret factors before key switching
    #[arg(long, env = "DRYNX_OBFUSCATION", default_value_t = false)]
    obfuscation: bool,

    /// Add shuffled Laplace noise to the result
    #[arg(long, env = "DRYNX_DIFF_PRIVACY", default_value_t = false)]
    diff_privacy: bool,

    /// Core config JSON (parallelism, table bound, thresholds, range)
    #[arg(long, env = "DRYNX_CONFIG")]
    config: Option<PathBuf>,

    /// RNG seed for keys, data and sampling
    #[arg(long, env = "DRYNX_SEED", default_value_t = 7)]
    seed: u64,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "DRYNX_LOG_JSON", default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: LOG_TARGET, "{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }
}

struct Node {
    identity: ServerIdentity<Curve>,
    keys: KeyPair<Curve>,
    signer: RequestSigner<Curve>,
    providers: Vec<Provider>,
}

struct Provider {
    signer: RequestSigner<Curve>,
}

/// Everything a participant needs to publish a proof.
struct Publisher<'a> {
    survey: &'a SurveyQuery<E>,
    params: &'a SurveyParameters<Curve>,
    verifier: Option<&'a SurveyVerifier<E>>,
}

impl Publisher<'_> {
    fn publish(
        &self,
        payload: ProofPayload<E>,
        differ_info: String,
        signer: &RequestSigner<Curve>,
        rng: &mut StdRng,
    ) -> Result<()> {
        let Some(verifier) = self.verifier else {
            return Ok(());
        };
        let kind = payload.kind();
        let request = ProofRequest::from_payload(
            &payload,
            SURVEY_ID,
            differ_info,
            self.survey.roster_servers.clone(),
            Vec::new(),
            self.params,
            signer,
            rng,
        )
        .with_context(|| format!("failed to sign {kind} proof of {}", signer.id))?;
        let code = verifier
            .handle(&request)
            .with_context(|| format!("verifier rejected {kind} request of {}", signer.id))?;
        if !code.is_acceptable() {
            warn!(target: LOG_TARGET, sender = %signer.id, %kind, ?code, "proof did not verify");
        }
        Ok(())
    }
}

fn run(args: Args) -> Result<()> {
    let config = CoreConfig::load(args.config.as_deref()).context("failed to load core config")?;
    config.apply();
    if args.nodes == 0 || args.providers < args.nodes {
        bail!(
            "need at least one computing node and one data provider per node, got {} nodes and {} providers",
            args.nodes,
            args.providers
        );
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let suite = Suite::<E>::new();
    let params = SurveyScheme::<Curve>::setup(&mut rng)
        .map_err(|err| anyhow!("failed to set up signatures: {err}"))?;
    let querier = KeyPair::<Curve>::random(&mut rng);

    let mut nodes = (0..args.nodes)
        .map(|i| {
            let keys = KeyPair::<Curve>::random(&mut rng);
            let id = format!("cn{i}");
            Ok(Node {
                identity: ServerIdentity::new(id.clone(), keys.public_key),
                signer: RequestSigner::generate(id, &params, &mut rng)?,
                keys,
                providers: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    for p in 0..args.providers {
        let signer = RequestSigner::generate(format!("dp{p}"), &params, &mut rng)?;
        nodes[p % args.nodes].providers.push(Provider { signer });
    }
    let roster = Roster::new(nodes.iter().map(|n| n.identity.clone()).collect());
    let collective = roster.aggregate();

    let operation = choose_operation(
        &args.operation,
        args.min,
        args.max,
        args.dimensions,
        args.cutting_factor,
    )?;
    if args.diff_privacy && operation.name_op.accepts_obfuscation() {
        bail!("noise cannot be added to the bit-encoded {}", operation.name_op);
    }
    let mut query = Query::<E>::new(operation.clone());
    query.obfuscation = args.obfuscation;
    query.cutting_factor = args.cutting_factor;
    query.selector = args.columns.clone();
    query.dp_data_gen.generate_rows = args.rows;
    query.dp_data_gen.generate_data_min = args.min;
    query.dp_data_gen.generate_data_max = args.max;
    if args.diff_privacy {
        query.diff_p = QueryDiffP {
            lap_mean: 0.0,
            lap_scale: 1.0,
            noise_list_size: 2 * args.nodes + 1,
            quanta: 0.0,
            scale: 1.0,
            limit: 5.0,
        };
    }

    // One credential set per computing node, acting as verifier for every slot.
    let mut credentials: Vec<Vec<PublishSignature<E>>> = Vec::new();
    if args.proofs {
        query.proofs = 1;
        let range = if args.obfuscation { (2, 1) } else { config.range };
        query.ranges = Some(vec![range; operation.nbr_output]);
        let mut published = Vec::with_capacity(nodes.len());
        for _ in &nodes {
            let sig = init_range_proof_signature(&suite, range.0, &mut rng)?;
            credentials.push(vec![sig.to_signature()?; operation.nbr_output]);
            published.push(vec![sig; operation.nbr_output]);
        }
        query.iv_sigs = QueryIVSigs::new(published);
    }

    let mut survey = SurveyQuery::new(SURVEY_ID, roster, querier.public_key, query);
    for node in &nodes {
        survey.server_to_dp.insert(
            node.identity.id.clone(),
            Some(
                node.providers
                    .iter()
                    .map(|p| ServerIdentity::new(p.signer.id.clone(), p.signer.public_key))
                    .collect(),
            ),
        );
        survey.register(&ServerIdentity::new(node.signer.id.clone(), node.signer.public_key));
        for provider in &node.providers {
            survey.register(&ServerIdentity::new(
                provider.signer.id.clone(),
                provider.signer.public_key,
            ));
        }
    }
    if args.proofs {
        config.apply_thresholds(&mut survey);
        if !args.obfuscation {
            survey.obfuscation_proof_threshold = 0.0;
        }
    }
    if !check_parameters(&survey, args.diff_privacy) {
        bail!("survey parameters are inconsistent");
    }

    let verifier = args
        .proofs
        .then(|| SurveyVerifier::new(suite, survey.clone(), params.clone(), args.seed));
    let publisher = Publisher {
        survey: &survey,
        params: &params,
        verifier: verifier.as_ref(),
    };

    let loader: Box<dyn DataLoader<E>> = match &args.data_file {
        Some(path) => Box::new(FileLoader::new(path)?),
        None => Box::new(RandomLoader::new(args.seed)),
    };
    let ranges = survey.query.ranges.clone().unwrap_or_default();
    let range_inputs = args
        .proofs
        .then(|| RangeInputs::new(&credentials, &ranges));

    // Providers encode; each node aggregates its own providers.
    let mut node_totals = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let mut responses = ResponseAllDPs::default();
        for provider in &node.providers {
            let rows: Vec<Vec<i64>> = loader
                .provide(&survey.query)
                .with_context(|| format!("{} failed to load data", provider.signer.id))?
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.round() as i64).collect())
                .collect();
            let encoded = encode(&rows, collective, &operation, range_inputs, &mut rng)?
                .replicate(args.cutting_factor);
            if !encoded.proofs.is_empty() {
                let list = create_predicate_range_proof_list(&suite, &encoded.proofs, &mut rng, None)?;
                publisher.publish(
                    ProofPayload::Range(list),
                    provider.signer.id.clone(),
                    &provider.signer,
                    &mut rng,
                )?;
            }
            responses.push(GROUP, CipherVector::from(encoded.ciphers));
        }
        let aggregated = ResponseAllDPs::from_groups(responses.group_sum()?);
        let total = aggregated
            .data
            .first()
            .map(|group| group.data.clone())
            .ok_or_else(|| anyhow!("{} has no provider data", node.identity.id))?;
        publisher.publish(
            ProofPayload::Aggregation(vec![server_aggregation_proof_creation(responses, aggregated)]),
            String::new(),
            &node.signer,
            &mut rng,
        )?;
        node_totals.push(total);
    }
    let mut result = node_totals
        .iter()
        .skip(1)
        .try_fold(node_totals[0].clone(), |acc, total| acc.add(total))?;

    if survey.query.obfuscation {
        for node in &nodes {
            let scalars: Vec<_> = (0..result.len()).map(|_| nonzero_scalar(&mut rng)).collect();
            let obfuscated: CipherVector<Curve> = result
                .iter()
                .zip(&scalars)
                .map(|(ct, s)| ct.mul_by_scalar(*s))
                .collect::<Vec<_>>()
                .into();
            let proof = obfuscation_list_proof_creation(
                result.as_slice(),
                obfuscated.as_slice(),
                &scalars,
                &mut rng,
                None,
            )?;
            publisher.publish(ProofPayload::Obfuscation(proof), String::new(), &node.signer, &mut rng)?;
            result = obfuscated;
        }
    }

    if args.diff_privacy {
        let noise = add_shuffled_noise(&survey, &nodes, collective, &publisher, &mut rng)?;
        let noise_vector: CipherVector<Curve> = vec![noise; result.len()].into();
        result = result.add(&noise_vector)?;
    }

    let mut shares = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let (node_shares, proof) =
            key_switch_with_proof(&result, node.keys.secret_key, querier.public_key, &mut rng, None)?;
        publisher.publish(ProofPayload::KeySwitch(proof), String::new(), &node.signer, &mut rng)?;
        shares.push(node_shares);
    }
    let switched = combine_share_vectors(&result, &shares)?;

    let table = DiscreteLogTable::global::<Curve>(config.dlog_limit);
    let slots = uncut(switched.as_slice(), args.cutting_factor)?;
    let values = decode(slots, querier.secret_key, &operation, &table)?;
    info!(target: LOG_TARGET, operation = %operation.name_op, ?values, "survey result");

    if let Some(verifier) = &verifier {
        let bitmap = verifier.bitmap();
        for (kind, code) in bitmap.codes() {
            info!(target: LOG_TARGET, %kind, code = code.code(), "bitmap entry");
        }
        if !bitmap.is_complete() {
            bail!("verifier did not receive every expected proof");
        }
        if !bitmap.all_valid() {
            bail!("at least one proof failed verification");
        }
    }
    let summary = serde_json::json!({
        "survey": SURVEY_ID,
        "operation": operation.name_op.name(),
        "result": values,
    });
    println!("{summary}");
    Ok(())
}

fn nonzero_scalar(rng: &mut StdRng) -> Scalar {
    loop {
        let s = Scalar::rand(rng);
        if !s.is_zero() {
            return s;
        }
    }
}

/// Every node shuffles the encrypted noise list in turn; the first entry of
/// the final list is the noise added to each result slot.
fn add_shuffled_noise(
    survey: &SurveyQuery<E>,
    nodes: &[Node],
    collective: Curve,
    publisher: &Publisher<'_>,
    rng: &mut StdRng,
) -> Result<Ciphertext<Curve>> {
    let dp = &survey.query.diff_p;
    let noise = generate_noise_values(
        dp.noise_list_size,
        dp.lap_mean,
        dp.lap_scale,
        dp.quanta,
        dp.scale,
        dp.limit,
    )?;
    let mut list: Vec<ProcessResponse<Curve>> = noise
        .iter()
        .map(|value| {
            ProcessResponse::from_attributes(CipherVector::encrypt(
                collective,
                &[value.round() as i64],
                rng,
            ))
        })
        .collect();

    let g = Curve::generator();
    for node in nodes {
        let (shuffled, pi, beta) = shuffle_sequence(&list, g, collective, None, rng)?;
        let proof = shuffling_proof_creation(&list, &shuffled, g, collective, &beta, &pi, rng, None)?;
        publisher.publish(ProofPayload::Shuffle(proof), String::new(), &node.signer, rng)?;
        list = shuffled;
    }
    list.first()
        .and_then(|record| record.slots().next().cloned())
        .ok_or_else(|| anyhow!("empty noise list"))
}
