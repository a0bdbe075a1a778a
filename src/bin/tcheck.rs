//! `tcheck`: covering-reachability CLI for networks of timed automata.
//!
//! Reads a normalized model from a JSON file, explores it with the selected
//! semantics/extrapolation/POR combination, and reports `REACHABLE true` or
//! `REACHABLE false`, optionally dumping the explored graph and run
//! statistics.

#![forbid(unsafe_code)]

use std::fs;
use std::io::Write as _;

use anyhow::{Context, Result};

use ntareach::config::{Config, GraphKind};
use ntareach::graph::Graph;
use ntareach::label::LabelMatcher;
use ntareach::model::Model;
use ntareach::reach::{self, CoverPredicate, Order};
use ntareach::sink;
use ntareach::ts::{BoundTables, Ta, TransitionSystem, Zg};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = Config::parse(&args).context("parsing command-line arguments")?;

    let bytes = fs::read(&cfg.model_file)
        .with_context(|| format!("reading model file {:?}", cfg.model_file))?;
    let model = Model::load_json(&bytes).context("parsing model JSON")?;
    model.validate().context("validating model")?;

    let por = cfg.por_policy().context("selecting --source-set policy")?;
    let labels = LabelMatcher::parse(&cfg.labels);
    let bounds = BoundTables {
        op: cfg.extrapolation,
        max: vec![1_000_000; model.clock_count],
        l: vec![1_000_000; model.clock_count],
        u: vec![1_000_000; model.clock_count],
    };

    let order = cfg.order;
    let cover = cfg.cover;

    let mut graph = Graph::new();
    let result = match cfg.graph_kind {
        GraphKind::Ta => {
            let ta = Ta::new(&model);
            run_with(&model, &ta, por.as_ref(), order, cover, &bounds, &labels, &mut graph)?
        }
        GraphKind::Zg | GraphKind::Azg => {
            tracing::info!(kind = ?cfg.graph_kind, "asynchronous layer not yet distinct from ZG in this build; using ZG semantics");
            let zg = Zg::new(&model, bounds.clone());
            run_with(&model, &zg, por.as_ref(), order, cover, &bounds, &labels, &mut graph)?
        }
    };

    println!("REACHABLE {}", result.reachable);

    if cfg.stats {
        println!(
            "STATS visited={} covered={} edges={} max_waiting={}",
            result.stats.visited_nodes,
            result.stats.covered_nodes,
            result.stats.edges,
            result.stats.max_waiting_size
        );
    }

    match &cfg.output_file {
        Some(path) => {
            let mut f = fs::File::create(path).with_context(|| format!("creating output file {path:?}"))?;
            sink::write_graph(&mut f, cfg.output_format, &model, &graph)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            if cfg.stats {
                // graph already summarized above; only dump on explicit -o
                // to avoid flooding stdout when -S is the point of the run.
            } else {
                sink::write_graph(&mut lock, cfg.output_format, &model, &graph)?;
                lock.flush()?;
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_with<TS: TransitionSystem>(
    model: &Model,
    ts: &TS,
    por: &dyn ntareach::por::PorPolicy,
    order: Order,
    cover: CoverPredicate,
    bounds: &BoundTables,
    labels: &LabelMatcher,
    graph: &mut Graph,
) -> Result<reach::RunResult> {
    reach::run(model, ts, por, order, cover, &bounds.max, &bounds.l, &bounds.u, labels, graph)
        .context("running covering-reachability")
}
