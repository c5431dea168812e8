//! The pipeline configuration, loaded from JSON.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::evaluate::ComplexityApproximator;
use crate::importer::ImportConfig;
use crate::mlearn::AlgorithmConfig;
use crate::vectorise::VectoriseConfig;

pub const DEFAULT_SEED: u64 = 42;

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_complexity_weight() -> f64 {
    ComplexityApproximator::DEFAULT_WEIGHT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateConfig {
    #[serde(default = "default_complexity_weight")]
    pub complexity_weight: f64,
    /// Time prediction on growing samples to estimate its growth exponent.
    #[serde(default)]
    pub approximate_complexity: bool,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            complexity_weight: default_complexity_weight(),
            approximate_complexity: false,
        }
    }
}

/// Everything one run needs: import plan, vectorisation, algorithm and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub import: ImportConfig,
    pub vectorise: VectoriseConfig,
    pub algorithm: AlgorithmConfig,
    #[serde(default)]
    pub evaluate: EvaluateConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate every stage without reading any data.
    pub fn validate(&self) -> Result<()> {
        self.import.validate()?;
        self.vectorise.validate()?;
        self.algorithm.validate()?;
        ComplexityApproximator::new(self.evaluate.complexity_weight)?;
        Ok(())
    }
}

fn list(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let import = &self.import;
        let demographic = &import.demographic;
        let vectorise = &self.vectorise;

        writeln!(f, "Program: {} (seed {})", self.name, self.seed)?;
        writeln!(f, "Import")?;
        let files: Vec<String> = import.files.iter().map(|p| p.display().to_string()).collect();
        writeln!(f, "  files:        {} ({})", list(&files), import.file_type)?;
        writeln!(f, "  text columns: {}", list(&import.columns.text))?;
        writeln!(f, "  flag column:  {}", import.columns.flag)?;
        writeln!(
            f,
            "  demographic:  ages {}-{}, sex {}, hospital {}, years {}-{}",
            demographic.min_age,
            demographic.max_age,
            demographic.sex,
            demographic.hospital,
            demographic.min_year,
            demographic.max_year
        )?;
        for (label, partition) in [("train", &import.train), ("test", &import.test)] {
            write!(f, "  {label}:{:width$}{} records, {}", "", partition.size, partition.distribution, width = 7 - label.len())?;
            match partition.positive_fraction {
                Some(fraction) => writeln!(f, ", {:.0}% positive", fraction * 100.0)?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "Vectorise")?;
        writeln!(f, "  tokeniser:    {}", vectorise.tokeniser.as_deref().unwrap_or("-"))?;
        writeln!(f, "  pre-LA:       {}", list(&vectorise.pre_la))?;
        writeln!(f, "  token level:  {}", list(&vectorise.token_level))?;
        writeln!(f, "  text level:   {}", list(&vectorise.text_level))?;
        writeln!(f, "  corpus level: {}", vectorise.corpus_level.as_deref().unwrap_or("-"))?;
        writeln!(f, "  n-grams:      {}-{}", vectorise.ngram_range.0, vectorise.ngram_range.1)?;
        writeln!(f, "Algorithm: {}", self.algorithm.algorithm)?;
        for (key, value) in &self.algorithm.params {
            writeln!(f, "  {key}: {value}")?;
        }
        write!(f, "Complexity weight: {}", self.evaluate.complexity_weight)
    }
}
