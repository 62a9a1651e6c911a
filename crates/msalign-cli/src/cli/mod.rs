//! Clap CLI definition: root struct, subcommands, and shared argument types.
use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use msalign_core::{
    ExperimentConfig, InputAlignmentMode, Linkage, MacroDivisor, MatcherParams, OrderHeuristic,
    PartitionMode, PlanStrategy, StepOrientation, TokenSimilarity,
};

/// A CLI argument that is either a filesystem path or the stdin sentinel `"-"`.
#[derive(Clone, Debug)]
pub enum PathOrStdin {
    /// Read from standard input.
    Stdin,
    /// Read from the given filesystem path.
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            Ok(PathOrStdin::Stdin)
        } else {
            Ok(PathOrStdin::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for PathOrStdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathOrStdin::Stdin => f.write_str("-"),
            PathOrStdin::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Output format for CLI commands.
///
/// `Human` prints aligned text tables to stdout. `Json` prints a single
/// pretty-printed JSON document to stdout.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default).
    Human,
    /// Structured JSON.
    Json,
}

/// How correspondences are assigned to test cases.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PartitionModeArg {
    /// Assign each correspondence on its own.
    Direct,
    /// Close equivalences transitively before assignment.
    TransitiveClosure,
}

impl From<PartitionModeArg> for PartitionMode {
    fn from(arg: PartitionModeArg) -> Self {
        match arg {
            PartitionModeArg::Direct => PartitionMode::Direct,
            PartitionModeArg::TransitiveClosure => PartitionMode::TransitiveClosure,
        }
    }
}

/// Prior correspondences handed to each matcher call.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InputAlignmentArg {
    /// An empty alignment.
    None,
    /// The whole running alignment.
    Full,
    /// Only correspondences touching the two operands.
    Restricted,
}

impl From<InputAlignmentArg> for InputAlignmentMode {
    fn from(arg: InputAlignmentArg) -> Self {
        match arg {
            InputAlignmentArg::None => InputAlignmentMode::None,
            InputAlignmentArg::Full => InputAlignmentMode::Full,
            InputAlignmentArg::Restricted => InputAlignmentMode::Restricted,
        }
    }
}

/// Which operand becomes the matcher's target side.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OrientationArg {
    /// Left operand as source, right operand as target.
    AsPlanned,
    /// The operand with more triples becomes the target.
    LargerAsTarget,
}

impl From<OrientationArg> for StepOrientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::AsPlanned => StepOrientation::AsPlanned,
            OrientationArg::LargerAsTarget => StepOrientation::LargerAsTarget,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

/// Merge-tree strategy flags. Unset flags fall back to the configuration.
#[derive(Args, Clone, Debug, Default)]
pub struct StrategyArgs {
    /// Sort-then-fold with this heuristic, e.g. `class-count-desc` or
    /// `model-size-asc`.
    #[arg(long, value_name = "HEURISTIC", conflicts_with_all = ["linkage", "similarity"])]
    pub order: Option<OrderHeuristic>,
    /// Agglomerative clustering linkage: single, complete or average.
    #[arg(long)]
    pub linkage: Option<Linkage>,
    /// Token similarity for clustering: jaccard, cosine or tfidf.
    #[arg(long)]
    pub similarity: Option<TokenSimilarity>,
}

impl StrategyArgs {
    /// Applies the flags on top of `base`.
    pub fn resolve(&self, base: PlanStrategy) -> PlanStrategy {
        if let Some(heuristic) = self.order {
            return PlanStrategy::Order(heuristic);
        }
        if self.linkage.is_none() && self.similarity.is_none() {
            return base;
        }
        let (base_linkage, base_similarity) = match base {
            PlanStrategy::Cluster {
                linkage,
                similarity,
            } => (linkage, similarity),
            PlanStrategy::Order(_) => (Linkage::default(), TokenSimilarity::default()),
        };
        PlanStrategy::Cluster {
            linkage: self.linkage.unwrap_or(base_linkage),
            similarity: self.similarity.unwrap_or(base_similarity),
        }
    }
}

/// Dataset resolution flags.
#[derive(Args, Clone, Debug, Default)]
pub struct ResolverArgs {
    /// Regex extracting a dataset id from an IRI (capture group 1 when
    /// present). Repeatable; replaces the configured patterns.
    #[arg(long = "dataset-pattern", value_name = "REGEX")]
    pub dataset_patterns: Vec<String>,
    /// Namespace whose IRIs never vote for a dataset (repeatable).
    #[arg(long = "deny-namespace", value_name = "IRI")]
    pub denied_namespaces: Vec<String>,
}

impl ResolverArgs {
    /// Writes the flags into `config`.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if !self.dataset_patterns.is_empty() {
            config.dataset_patterns.clone_from(&self.dataset_patterns);
        }
        config
            .denied_namespaces
            .extend(self.denied_namespaces.iter().cloned());
    }
}

/// Scoring flags.
#[derive(Args, Clone, Debug, Default)]
pub struct EvaluationArgs {
    /// Partition mode: direct or transitive-closure.
    #[arg(long, value_enum)]
    pub partition_mode: Option<PartitionModeArg>,
    /// Macro-average divisor: `non-empty`, `all`, or a fixed count.
    #[arg(long, value_name = "DIVISOR")]
    pub macro_divisor: Option<MacroDivisor>,
}

impl EvaluationArgs {
    /// Writes the flags into `config`.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(mode) = self.partition_mode {
            config.evaluation.partition_mode = mode.into();
        }
        if let Some(divisor) = self.macro_divisor {
            config.evaluation.macro_divisor = divisor;
        }
    }
}

/// External matcher and dispatch flags.
#[derive(Args, Clone, Debug)]
pub struct DispatchArgs {
    /// Matcher program. It is called once per merge step with four extra
    /// arguments (`left.json right.json input.json params.json`) and must
    /// print an alignment JSON list to stdout.
    #[arg(long, value_name = "PROGRAM")]
    pub matcher: PathBuf,
    /// Arguments placed before the four file paths (after `--`).
    #[arg(last = true, value_name = "ARGS")]
    pub matcher_args: Vec<String>,
    /// Prior correspondences passed to each call.
    #[arg(long, value_enum)]
    pub input_alignment: Option<InputAlignmentArg>,
    /// Side assignment of each step's operands.
    #[arg(long, value_enum)]
    pub orientation: Option<OrientationArg>,
    /// Matcher parameter as KEY=VALUE; VALUE is read as JSON when it parses,
    /// as a string otherwise (repeatable).
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, serde_json::Value)>,
    /// Keep each step's raw matcher output in JSON results.
    #[arg(long)]
    pub keep_step_alignments: bool,
}

impl DispatchArgs {
    /// Writes the flags into `config`.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(mode) = self.input_alignment {
            config.dispatch.input_alignment = mode.into();
        }
        if let Some(orientation) = self.orientation {
            config.dispatch.orientation = orientation.into();
        }
        let params: MatcherParams = self.params.iter().cloned().collect();
        config.dispatch.params.extend(params);
        if self.keep_step_alignments {
            config.dispatch.keep_step_alignments = true;
        }
    }
}

/// Parses `KEY=VALUE` for `--param`.
pub fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// All top-level subcommands exposed by the `msalign` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Build one merge tree for a track and print it.
    Plan {
        /// Path to a track JSON file, or `-` for stdin.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// List the distinct merge trees produced by every order heuristic.
    Orders {
        /// Path to a track JSON file, or `-` for stdin.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
    },

    /// Print the dataset id of every source and test-case side.
    Resolve {
        /// Path to a track JSON file, or `-` for stdin.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
        #[command(flatten)]
        resolver: ResolverArgs,
    },

    /// Partition a global alignment onto the test cases and score it.
    Evaluate {
        /// Path to a track JSON file.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
        /// Path to an alignment JSON list, or `-` for stdin.
        #[arg(value_name = "ALIGNMENT")]
        alignment: PathOrStdin,
        #[command(flatten)]
        resolver: ResolverArgs,
        #[command(flatten)]
        evaluation: EvaluationArgs,
    },

    /// Plan, dispatch with an external matcher, and evaluate.
    Run {
        /// Path to a track JSON file, or `-` for stdin.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
        #[command(flatten)]
        strategy: StrategyArgs,
        #[command(flatten)]
        dispatch: DispatchArgs,
        #[command(flatten)]
        resolver: ResolverArgs,
        #[command(flatten)]
        evaluation: EvaluationArgs,
    },

    /// Run every order heuristic and linkage, once per distinct tree.
    Compare {
        /// Path to a track JSON file, or `-` for stdin.
        #[arg(value_name = "TRACK")]
        track: PathOrStdin,
        /// Token similarity used by the clustering strategies.
        #[arg(long, default_value = "tfidf")]
        similarity: TokenSimilarity,
        /// Skip the all-pairs, first-vs-rest and chain baselines.
        #[arg(long)]
        no_baselines: bool,
        #[command(flatten)]
        dispatch: DispatchArgs,
        #[command(flatten)]
        resolver: ResolverArgs,
        #[command(flatten)]
        evaluation: EvaluationArgs,
    },
}

/// Root CLI struct for the `msalign` binary.
///
/// All global flags are marked `global = true` so that clap propagates them
/// to every subcommand.
#[derive(Parser)]
#[command(
    name = "msalign",
    version,
    about = "Multi-source alignment planner and evaluator",
    long_about = "Plans merge orders for N-way ontology and knowledge-graph matching,\n\
                  drives a two-way matcher over the plan, and scores the resulting\n\
                  global alignment against pairwise reference alignments."
)]
pub struct Cli {
    /// Active subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Output format: human (default) or json.
    #[arg(long, short = 'f', default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Only log errors to stderr (incompatible with `--verbose`).
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Raise log verbosity; repeat for more (`-v` info, `-vv` debug,
    /// `-vvv` trace). `RUST_LOG` takes precedence when set.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Experiment configuration JSON; flags override its values.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathOrStdin>,

    /// Maximum input file size in bytes.
    ///
    /// Can also be set via the `MSALIGN_MAX_FILE_SIZE` environment variable.
    #[arg(
        long,
        global = true,
        env = "MSALIGN_MAX_FILE_SIZE",
        default_value = "268435456"
    )]
    pub max_file_size: u64,
}
