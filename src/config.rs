//! CLI configuration: parses the flags from the external-interfaces surface
//! into a typed [`Config`]. Hand-rolled flag scanning, in the same style the
//! teacher repo's binaries use instead of a derive-macro argument parser.

use thiserror::Error;

use crate::por::PorPolicy;
use crate::reach::{CoverPredicate, Order};
use crate::sink::OutputFormat;
use crate::zone::Extrapolation;

/// Errors raised while parsing CLI arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required positional argument: model file")]
    MissingModelFile,
    #[error("unknown value {0:?} for -s (expected bfs or dfs)")]
    BadSearchOrder(String),
    #[error("unknown value {0:?} for -f (expected dot or raw)")]
    BadOutputFormat(String),
    #[error("unknown value {0:?} for -m (expected graph:semantics:extrapolation)")]
    BadSemanticsTriple(String),
    #[error("por4 is an unfinished upstream prototype and is not supported; pick another --source-set value")]
    UnsupportedSourceSet,
    #[error("unknown value {0:?} for --source-set")]
    BadSourceSet(String),
    #[error("invalid integer for {flag}: {value:?}")]
    BadInteger { flag: &'static str, value: String },
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Graph layer selected by the first component of `-m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    Ta,
    Zg,
    Azg,
}

/// Semantics selected by the second component of `-m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticsKind {
    Sync,
    BoundedSpread,
}

/// Parsed configuration for a single `tcheck` run.
pub struct Config {
    pub model_file: String,
    pub cover: CoverPredicate,
    pub output_format: OutputFormat,
    pub output_file: Option<String>,
    pub labels: String,
    pub graph_kind: GraphKind,
    pub semantics_kind: SemanticsKind,
    pub extrapolation: Extrapolation,
    pub order: Order,
    pub stats: bool,
    pub server: bool,
    pub spread: i64,
    pub source_set: String,
    pub block_size: usize,
    pub table_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            model_file: String::new(),
            cover: CoverPredicate::Exact,
            output_format: OutputFormat::Dot,
            output_file: None,
            labels: String::new(),
            graph_kind: GraphKind::Zg,
            semantics_kind: SemanticsKind::Sync,
            extrapolation: Extrapolation::None,
            order: Order::Bfs,
            stats: false,
            server: false,
            spread: 0,
            source_set: "none".into(),
            block_size: 10_000,
            table_size: 65_536,
        }
    }
}

/// Finds `--flag value` or `-f value` in `args`, returning the value and
/// consuming both tokens from a working copy is left to the caller; this
/// just searches, mirroring the teacher's own `parse_flag` helper.
fn parse_flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_u64_flag(args: &[String], flag: &'static str, default: u64) -> Result<u64> {
    match parse_flag(args, flag) {
        None => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| ConfigError::BadInteger { flag, value: v.to_string() }),
    }
}

fn parse_i64_flag(args: &[String], flag: &'static str, default: i64) -> Result<i64> {
    match parse_flag(args, flag) {
        None => Ok(default),
        Some(v) => v.parse::<i64>().map_err(|_| ConfigError::BadInteger { flag, value: v.to_string() }),
    }
}

impl Config {
    /// Parses `args` (excluding argv[0]) into a [`Config`]. The model file
    /// is the first token not recognized as, or consumed as the value of, a
    /// known flag.
    pub fn parse(args: &[String]) -> Result<Config> {
        let mut cfg = Config::default();

        if let Some(v) = parse_flag(args, "-c") {
            cfg.cover = match v {
                "exact" => CoverPredicate::Exact,
                "abstract" => CoverPredicate::Abstract,
                _ => CoverPredicate::Exact,
            };
        }

        if let Some(v) = parse_flag(args, "-f") {
            cfg.output_format = match v {
                "dot" => OutputFormat::Dot,
                "raw" => OutputFormat::Raw,
                other => return Err(ConfigError::BadOutputFormat(other.to_string())),
            };
        }

        if let Some(v) = parse_flag(args, "-l") {
            cfg.labels = v.to_string();
        }

        if let Some(v) = parse_flag(args, "-m") {
            let parts: Vec<&str> = v.split(':').collect();
            if parts.len() != 3 {
                return Err(ConfigError::BadSemanticsTriple(v.to_string()));
            }
            cfg.graph_kind = match parts[0] {
                "ta" => GraphKind::Ta,
                "zg" => GraphKind::Zg,
                "azg" => GraphKind::Azg,
                _ => return Err(ConfigError::BadSemanticsTriple(v.to_string())),
            };
            cfg.semantics_kind = match parts[1] {
                "sync" => SemanticsKind::Sync,
                "spread" => SemanticsKind::BoundedSpread,
                _ => return Err(ConfigError::BadSemanticsTriple(v.to_string())),
            };
            cfg.extrapolation = match parts[2] {
                "none" => Extrapolation::None,
                "extram" => Extrapolation::ExtraMGlobal,
                "extralu" => Extrapolation::ExtraLuGlobal,
                "extram+" => Extrapolation::ExtraMPlusLocal,
                "extralu+" => Extrapolation::ExtraLuPlusLocal,
                _ => return Err(ConfigError::BadSemanticsTriple(v.to_string())),
            };
        }

        if let Some(v) = parse_flag(args, "-o") {
            cfg.output_file = Some(v.to_string());
        }

        if let Some(v) = parse_flag(args, "-s") {
            cfg.order = match v {
                "bfs" => Order::Bfs,
                "dfs" => Order::Dfs,
                other => return Err(ConfigError::BadSearchOrder(other.to_string())),
            };
        }

        cfg.stats = has_flag(args, "-S");
        cfg.server = has_flag(args, "--server");
        cfg.spread = parse_i64_flag(args, "--spread", 0)?;

        if let Some(v) = parse_flag(args, "--source-set") {
            if v == "por4" {
                return Err(ConfigError::UnsupportedSourceSet);
            }
            cfg.source_set = v.to_string();
        }

        cfg.block_size = parse_u64_flag(args, "--block-size", cfg.block_size as u64)? as usize;
        cfg.table_size = parse_u64_flag(args, "--table-size", cfg.table_size as u64)? as usize;

        cfg.model_file = args
            .iter()
            .enumerate()
            .find(|(i, a)| !a.starts_with('-') && !is_consumed_value(args, *i))
            .map(|(_, a)| a.clone())
            .ok_or(ConfigError::MissingModelFile)?;

        Ok(cfg)
    }

    /// Builds the named POR policy for this configuration's `--source-set`
    /// value, boxed for storage in the run loop.
    pub fn por_policy(&self) -> Result<Box<dyn PorPolicy>> {
        use crate::por::*;
        Ok(match self.source_set.as_str() {
            "none" => Box::new(NoPor),
            "cs" => Box::new(Cs),
            "gl" => Box::new(Gl),
            "por1" => Box::new(Por1),
            "por2" => Box::new(Por2),
            "por3" => Box::new(Por3),
            "por5" => Box::new(Por5),
            "rr" => Box::new(Rr),
            "magnetic" => Box::new(Magnetic),
            "pure_local" => Box::new(PureLocal),
            other => return Err(ConfigError::BadSourceSet(other.to_string())),
        })
    }
}

/// Flags that take a value; used so the positional-argument scan in
/// [`Config::parse`] skips over `-f dot`'s `dot` token instead of mistaking
/// it for the model file.
const VALUE_FLAGS: &[&str] = &["-c", "-f", "-l", "-m", "-o", "-s", "--spread", "--source-set", "--block-size", "--table-size"];

fn is_consumed_value(args: &[String], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    VALUE_FLAGS.contains(&args[i - 1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_model_file_and_defaults() {
        let cfg = Config::parse(&args(&["model.json"])).unwrap();
        assert_eq!(cfg.model_file, "model.json");
        assert_eq!(cfg.order, Order::Bfs);
    }

    #[test]
    fn parses_search_order_and_format() {
        let cfg = Config::parse(&args(&["-s", "dfs", "-f", "raw", "model.json"])).unwrap();
        assert_eq!(cfg.order, Order::Dfs);
        assert_eq!(cfg.output_format, OutputFormat::Raw);
        assert_eq!(cfg.model_file, "model.json");
    }

    #[test]
    fn rejects_por4() {
        let err = Config::parse(&args(&["--source-set", "por4", "model.json"])).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedSourceSet);
    }

    #[test]
    fn missing_model_file_is_an_error() {
        let err = Config::parse(&args(&["-S"])).unwrap_err();
        assert_eq!(err, ConfigError::MissingModelFile);
    }

    #[test]
    fn builds_named_por_policy() {
        let cfg = Config::parse(&args(&["--source-set", "por1", "model.json"])).unwrap();
        assert_eq!(cfg.por_policy().unwrap().name(), "por1");
    }
}
