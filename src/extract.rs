//! Sampling strategies that pick a labelled subset out of a corpus.

use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::data::Record;
use crate::error::{Error, ErrorKind, Result};

/// Which partition an extraction produces. Decides the error kinds reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    fn size_kind(self) -> ErrorKind {
        match self {
            Partition::Train => ErrorKind::NegTrainSize,
            Partition::Test => ErrorKind::NegTestSize,
        }
    }

    fn dist_kind(self) -> ErrorKind {
        match self {
            Partition::Train => ErrorKind::TrainDist,
            Partition::Test => ErrorKind::TestDist,
        }
    }

    fn positive_kind(self) -> ErrorKind {
        match self {
            Partition::Train => ErrorKind::TrainPosPercent,
            Partition::Test => ErrorKind::TestPosPercent,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Train => write!(f, "train"),
            Partition::Test => write!(f, "test"),
        }
    }
}

/// The records an extraction picked, and everything it left behind.
/// Both keep the corpus order.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub selected: Vec<Record>,
    pub leftover: Vec<Record>,
}

/// How many records to take, and optionally which share of them must be positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    pub partition: Partition,
    pub amount: i64,
    pub positive_fraction: Option<f64>,
}

pub trait Extractor {
    /// Choose `amount` distinct indices out of `0..available`, in ascending order.
    /// Callers guarantee `amount <= available`.
    fn select(&self, available: usize, amount: usize, rng: &mut StdRng) -> Vec<usize>;

    /// Split `corpus` into the requested partition and its leftover.
    fn extract(&self, corpus: Vec<Record>, request: &Request, rng: &mut StdRng) -> Result<Extraction> {
        let partition = request.partition;
        if request.amount < 0 {
            return Err(Error::invalid(
                partition.size_kind(),
                format!("{partition} size cannot be negative, got {}", request.amount),
            ));
        }
        let amount = request.amount as usize;
        if amount > corpus.len() {
            return Err(Error::invalid(
                ErrorKind::MoreDataThanRecords,
                format!(
                    "requested {amount} {partition} records but only {} are available",
                    corpus.len()
                ),
            ));
        }

        let chosen = match request.positive_fraction {
            None => self.select(corpus.len(), amount, rng),
            Some(fraction) => {
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(Error::invalid(
                        partition.positive_kind(),
                        format!("{partition} positive fraction must be within [0, 1], got {fraction}"),
                    ));
                }
                let (positives, negatives): (Vec<usize>, Vec<usize>) =
                    (0..corpus.len()).partition(|&i| corpus[i].is_positive());
                let wanted_positives = (amount as f64 * fraction).round() as usize;
                let wanted_negatives = amount - wanted_positives;
                if wanted_positives > positives.len() || wanted_negatives > negatives.len() {
                    return Err(Error::invalid(
                        partition.positive_kind(),
                        format!(
                            "{partition} needs {wanted_positives} positive and {wanted_negatives} negative records, \
                             corpus has {} and {}",
                            positives.len(),
                            negatives.len()
                        ),
                    ));
                }

                let mut chosen: Vec<usize> = self
                    .select(positives.len(), wanted_positives, rng)
                    .into_iter()
                    .map(|i| positives[i])
                    .chain(
                        self.select(negatives.len(), wanted_negatives, rng)
                            .into_iter()
                            .map(|i| negatives[i]),
                    )
                    .collect();
                chosen.sort_unstable();
                chosen
            }
        };

        let mut picked = vec![false; corpus.len()];
        for i in chosen {
            picked[i] = true;
        }
        let (selected, leftover): (Vec<(usize, Record)>, Vec<(usize, Record)>) =
            corpus.into_iter().enumerate().partition(|(i, _)| picked[*i]);
        let selected: Vec<Record> = selected.into_iter().map(|(_, r)| r).collect();
        let leftover: Vec<Record> = leftover.into_iter().map(|(_, r)| r).collect();

        let positives = selected.iter().filter(|r| r.is_positive()).count();
        if positives == 0 || positives == selected.len() {
            return Err(Error::invalid(
                partition.dist_kind(),
                format!(
                    "{partition} partition of {} records needs both classes, has {positives} positive",
                    selected.len()
                ),
            ));
        }
        debug!(
            "extracted {} {partition} records ({positives} positive), {} left over",
            selected.len(),
            leftover.len()
        );

        Ok(Extraction { selected, leftover })
    }
}

/// Every record equally likely, independent of ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl Extractor for Uniform {
    fn select(&self, available: usize, amount: usize, rng: &mut StdRng) -> Vec<usize> {
        let mut chosen = index::sample(rng, available, amount).into_vec();
        chosen.sort_unstable();
        chosen
    }
}

/// A contiguous block starting at a random position.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBlock;

impl Extractor for RandomBlock {
    fn select(&self, available: usize, amount: usize, rng: &mut StdRng) -> Vec<usize> {
        let start = rng.random_range(0..=available - amount);
        (start..start + amount).collect()
    }
}

/// The head block of the corpus. The importer sorts newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewestBlock;

impl Extractor for NewestBlock {
    fn select(&self, _available: usize, amount: usize, _rng: &mut StdRng) -> Vec<usize> {
        (0..amount).collect()
    }
}

/// Extractor identifiers as they appear in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Distribution {
    Uniform,
    NewestBlock,
    RandomBlock,
}

impl Distribution {
    /// Parse a distribution name, reporting failures against `partition`.
    pub fn parse(name: &str, partition: Partition) -> Result<Self> {
        match name {
            "UNIFORM" => Ok(Distribution::Uniform),
            "NEWESTBLOCK" => Ok(Distribution::NewestBlock),
            "RANDOMBLOCK" => Ok(Distribution::RandomBlock),
            other => Err(Error::invalid(
                partition.dist_kind(),
                format!(
                    "{partition} distribution must be UNIFORM, NEWESTBLOCK or RANDOMBLOCK, got {other:?}"
                ),
            )),
        }
    }

    pub fn extractor(self) -> &'static dyn Extractor {
        match self {
            Distribution::Uniform => &Uniform,
            Distribution::NewestBlock => &NewestBlock,
            Distribution::RandomBlock => &RandomBlock,
        }
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Distribution::parse(s, Partition::Train)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distribution::Uniform => "UNIFORM",
            Distribution::NewestBlock => "NEWESTBLOCK",
            Distribution::RandomBlock => "RANDOMBLOCK",
        };
        f.write_str(name)
    }
}
