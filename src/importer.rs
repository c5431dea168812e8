//! Reads delimited files into records, filters them by demographic and
//! extracts the train and test partitions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::data::{DataSet, Demographic, DemographicConfig, DemographicSummary, FieldDefinitions, Flag, Record};
use crate::error::{Error, ErrorKind, Result};
use crate::evaluate::{Stage, StageTimings};
use crate::extract::{Distribution, Partition, Request};

/// Date layouts accepted in the date column, most specific first.
const DATE_TIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M", "%d/%m/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Csv,
    Tsv,
}

impl FileType {
    pub fn delimiter(self) -> u8 {
        match self {
            FileType::Csv => b',',
            FileType::Tsv => b'\t',
        }
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "tsv" => Ok(FileType::Tsv),
            other => Err(Error::invalid(
                ErrorKind::UnsupportedFileType,
                format!("file type must be csv or tsv, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Csv => f.write_str("csv"),
            FileType::Tsv => f.write_str("tsv"),
        }
    }
}

/// Header labels of the columns to read. Unset optional columns are neither
/// read nor filtered on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLabels {
    pub date: Option<String>,
    pub hospital: Option<String>,
    pub sex: Option<String>,
    pub age: Option<String>,
    pub text: Vec<String>,
    pub flag: String,
}

impl ColumnLabels {
    pub fn field_definitions(&self) -> FieldDefinitions {
        FieldDefinitions {
            text_columns: self.text.clone(),
            flag_column: self.flag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub size: i64,
    pub distribution: String,
    /// Share of positive records in `[0, 1]`; unset takes whatever the extractor picks.
    #[serde(default)]
    pub positive_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub files: Vec<PathBuf>,
    pub file_type: String,
    pub columns: ColumnLabels,
    #[serde(default)]
    pub demographic: DemographicConfig,
    pub train: PartitionConfig,
    pub test: PartitionConfig,
}

impl ImportConfig {
    /// Check everything that can be checked without reading the files.
    pub fn validate(&self) -> Result<Importer> {
        let file_type: FileType = self.file_type.parse()?;
        if self.columns.text.is_empty() || self.columns.text.iter().any(|c| c.is_empty()) {
            return Err(Error::invalid(
                ErrorKind::NoTextFields,
                "at least one non-empty text column label is required",
            ));
        }
        if self.columns.flag.is_empty() {
            return Err(Error::invalid(ErrorKind::NoFlagField, "a flag column label is required"));
        }
        let demographic = self.demographic.validate()?;
        let train = PartitionPlan::new(&self.train, Partition::Train)?;
        let test = PartitionPlan::new(&self.test, Partition::Test)?;

        Ok(Importer {
            files: self.files.clone(),
            file_type,
            columns: self.columns.clone(),
            demographic,
            train,
            test,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PartitionPlan {
    distribution: Distribution,
    request: Request,
}

impl PartitionPlan {
    fn new(config: &PartitionConfig, partition: Partition) -> Result<Self> {
        let distribution = Distribution::parse(&config.distribution, partition)?;
        let (size_kind, positive_kind) = match partition {
            Partition::Train => (ErrorKind::NegTrainSize, ErrorKind::TrainPosPercent),
            Partition::Test => (ErrorKind::NegTestSize, ErrorKind::TestPosPercent),
        };
        if config.size < 0 {
            return Err(Error::invalid(
                size_kind,
                format!("{partition} size cannot be negative, got {}", config.size),
            ));
        }
        if let Some(fraction) = config.positive_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(Error::invalid(
                    positive_kind,
                    format!("{partition} positive fraction must be within [0, 1], got {fraction}"),
                ));
            }
        }
        Ok(Self {
            distribution,
            request: Request {
                partition,
                amount: config.size,
                positive_fraction: config.positive_fraction,
            },
        })
    }
}

/// A validated import plan.
#[derive(Debug, Clone)]
pub struct Importer {
    files: Vec<PathBuf>,
    file_type: FileType,
    columns: ColumnLabels,
    demographic: Demographic,
    train: PartitionPlan,
    test: PartitionPlan,
}

/// The result of an import: both partitions, their demographics and timings.
#[derive(Debug, Clone)]
pub struct Import {
    pub train: DataSet,
    pub test: DataSet,
    pub train_summary: DemographicSummary,
    pub test_summary: DemographicSummary,
    pub timings: StageTimings,
}

impl Importer {
    pub fn columns(&self) -> &ColumnLabels {
        &self.columns
    }

    /// Read every file, filter, order newest first and extract both partitions.
    pub fn import(&self, rng: &mut StdRng) -> Result<Import> {
        let mut timings = StageTimings::default();

        info!("Importing data from {} file(s)...", self.files.len());
        let start = Instant::now();
        let mut corpus = Vec::new();
        for path in &self.files {
            corpus.extend(self.read_file(path)?);
        }
        timings.record(Stage::Import, start.elapsed());
        info!("Imported {} records", corpus.len());

        info!("Filtering data...");
        let start = Instant::now();
        corpus.retain(|record| self.demographic.contains(record));
        if self.columns.date.is_some() {
            corpus.sort_by(|a, b| b.presented.cmp(&a.presented));
        }
        timings.record(Stage::Filter, start.elapsed());
        info!("{} records in the demographic", corpus.len());

        info!("Extracting training data...");
        let start = Instant::now();
        let train = self
            .train
            .distribution
            .extractor()
            .extract(corpus, &self.train.request, rng)?;
        timings.record(Stage::TrainExtract, start.elapsed());

        info!("Extracting testing data...");
        let start = Instant::now();
        let test = self
            .test
            .distribution
            .extractor()
            .extract(train.leftover, &self.test.request, rng)?;
        timings.record(Stage::TestExtract, start.elapsed());

        let fields = self.columns.field_definitions();
        let train = DataSet::new(fields.clone(), train.selected)?;
        let test = DataSet::new(fields, test.selected)?;
        info!(
            "Train: {} records ({} positive), test: {} records ({} positive)",
            train.len(),
            train.positives(),
            test.len(),
            test.positives()
        );

        Ok(Import {
            train_summary: train.summary(),
            test_summary: test.summary(),
            train,
            test,
            timings,
        })
    }

    fn read_file(&self, path: &Path) -> Result<Vec<Record>> {
        debug!("reading {}", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.file_type.delimiter())
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let layout = ColumnLayout::resolve(&self.columns, &headers, path)?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let line = result?;
            // header is line 1
            let line_number = row + 2;
            if line.len() != headers.len() {
                return Err(Error::invalid(
                    ErrorKind::TimesSpacesNotEqual,
                    format!(
                        "{} line {line_number} has {} fields, header has {}",
                        path.display(),
                        line.len(),
                        headers.len()
                    ),
                ));
            }
            records.push(layout.parse(&line).map_err(|err| match err {
                Error::Validation(mut inner) => {
                    inner.detail = format!("{} line {line_number}: {}", path.display(), inner.detail);
                    Error::Validation(inner)
                }
                other => other,
            })?);
        }
        Ok(records)
    }
}

/// Column positions of one file's header.
struct ColumnLayout {
    date: Option<usize>,
    hospital: Option<usize>,
    sex: Option<usize>,
    age: Option<usize>,
    text: Vec<usize>,
    flag: usize,
}

impl ColumnLayout {
    fn resolve(labels: &ColumnLabels, headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        let find = |label: &str| {
            headers.iter().position(|h| h.trim() == label).ok_or_else(|| {
                Error::invalid(
                    ErrorKind::ColumnLabel,
                    format!("column {label:?} not found in {}", path.display()),
                )
            })
        };
        let optional = |label: &Option<String>| label.as_deref().map(find).transpose();

        Ok(Self {
            date: optional(&labels.date)?,
            hospital: optional(&labels.hospital)?,
            sex: optional(&labels.sex)?,
            age: optional(&labels.age)?,
            text: labels.text.iter().map(|l| find(l)).collect::<Result<_>>()?,
            flag: find(&labels.flag)?,
        })
    }

    fn parse(&self, line: &csv::StringRecord) -> Result<Record> {
        let cell = |index: usize| line.get(index).map(str::trim).unwrap_or_default();
        // a configured demographic column must be filled in on every row
        let present = |index: Option<usize>, what: &'static str| {
            match index.map(cell) {
                Some("") => Err(Error::invalid(ErrorKind::File, format!("{what} cell is blank"))),
                value => Ok(value),
            }
        };

        let presented = present(self.date, "date")?.map(parse_date).transpose()?;
        let hospital = present(self.hospital, "hospital")?.map(str::to_string);
        let sex = present(self.sex, "sex")?
            .map(|value| {
                value
                    .parse::<i64>()
                    .map_err(|_| Error::invalid(ErrorKind::File, format!("sex code {value:?} is not an integer")))
            })
            .transpose()?;
        let age = present(self.age, "age")?
            .map(|value| {
                value
                    .parse::<f64>()
                    .map_err(|_| Error::invalid(ErrorKind::File, format!("age {value:?} is not a number")))
            })
            .transpose()?;
        let texts = self
            .text
            .iter()
            .map(|&index| line.get(index).unwrap_or_default().to_string())
            .collect();
        let flag = parse_flag(cell(self.flag))?;

        Ok(Record {
            presented,
            hospital,
            sex,
            age,
            texts,
            flag,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| Error::invalid(ErrorKind::File, format!("date {value:?} is not in a recognised format")))
}

fn parse_flag(value: &str) -> Result<Flag> {
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(Error::invalid(
            ErrorKind::BadActualFlag,
            format!("flag {value:?} is not 0 or 1"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Date,Hospital,Sex,Age,TriageDescription,SSH_Flag";

    fn write_csv(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn config(path: &Path) -> ImportConfig {
        ImportConfig {
            files: vec![path.to_path_buf()],
            file_type: "csv".into(),
            columns: ColumnLabels {
                date: Some("Date".into()),
                hospital: Some("Hospital".into()),
                sex: Some("Sex".into()),
                age: Some("Age".into()),
                text: vec!["TriageDescription".into()],
                flag: "SSH_Flag".into(),
            },
            demographic: DemographicConfig::default(),
            train: PartitionConfig {
                size: 10,
                distribution: "NEWESTBLOCK".into(),
                positive_fraction: None,
            },
            test: PartitionConfig {
                size: 6,
                distribution: "UNIFORM".into(),
                positive_fraction: None,
            },
        }
    }

    fn rows() -> Vec<String> {
        (0..20)
            .map(|i| {
                format!(
                    "{:02}/03/2019 10:00,{},{},{},patient note {i},{}",
                    i + 1,
                    if i % 3 == 0 { "CHPB" } else { "CHHS" },
                    1 + i % 2,
                    20 + i,
                    i % 2
                )
            })
            .collect()
    }

    #[test]
    fn imports_newest_block_and_disjoint_test() {
        let file = write_csv(&rows());
        let importer = config(file.path()).validate().unwrap();
        let import = importer.import(&mut StdRng::seed_from_u64(5)).unwrap();

        assert_eq!(import.train.len(), 10);
        assert_eq!(import.test.len(), 6);
        // newest first: the train block holds days 20 down to 11
        let newest = import.train.records()[0].presented.unwrap();
        assert_eq!(newest.format("%d").to_string(), "20");
        for record in import.test.records() {
            assert!(!import.train.records().contains(record));
        }
        assert_eq!(import.train_summary.records, 10);
        assert!(import.timings.get(Stage::Import).is_some());
    }

    #[test]
    fn config_errors_are_reported_before_reading() {
        let file = write_csv(&rows());
        let kind = |f: fn(&mut ImportConfig)| {
            let mut c = config(file.path());
            f(&mut c);
            c.validate().unwrap_err().kind()
        };
        assert_eq!(kind(|c| c.file_type = "xlsx".into()), Some(ErrorKind::UnsupportedFileType));
        assert_eq!(kind(|c| c.columns.text.clear()), Some(ErrorKind::NoTextFields));
        assert_eq!(kind(|c| c.columns.flag.clear()), Some(ErrorKind::NoFlagField));
        assert_eq!(kind(|c| c.train.size = -3), Some(ErrorKind::NegTrainSize));
        assert_eq!(kind(|c| c.test.size = -1), Some(ErrorKind::NegTestSize));
        assert_eq!(kind(|c| c.train.distribution = "ALL".into()), Some(ErrorKind::TrainDist));
        assert_eq!(kind(|c| c.test.positive_fraction = Some(1.5)), Some(ErrorKind::TestPosPercent));
    }

    #[test]
    fn malformed_files_fail_the_import() {
        let mut rng = StdRng::seed_from_u64(0);

        let mut lines = rows();
        lines[4] = "01/01/2019 10:00,CHHS,1,30,too,many,fields".into();
        let file = write_csv(&lines);
        let err = config(file.path()).validate().unwrap().import(&mut rng).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TimesSpacesNotEqual));

        let mut lines = rows();
        lines[2] = "01/01/2019 10:00,CHHS,1,30,note,7".into();
        let file = write_csv(&lines);
        let err = config(file.path()).validate().unwrap().import(&mut rng).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadActualFlag));

        let mut lines = rows();
        lines[2] = "yesterday,CHHS,1,30,note,1".into();
        let file = write_csv(&lines);
        let err = config(file.path()).validate().unwrap().import(&mut rng).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::File));

        let file = write_csv(&rows());
        let mut c = config(file.path());
        c.columns.age = Some("PatientAge".into());
        let err = c.validate().unwrap().import(&mut rng).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ColumnLabel));
    }

    #[test]
    fn blank_demographic_cells_fail_the_import() {
        let mut rng = StdRng::seed_from_u64(0);
        for (column, line) in [
            ("age", "05/03/2019 10:00,CHHS,1,,patient note,1"),
            ("sex", "05/03/2019 10:00,CHHS,,30,patient note,1"),
            ("hospital", "05/03/2019 10:00,,1,30,patient note,1"),
            ("date", ",CHHS,1,30,patient note,1"),
        ] {
            let mut lines = rows();
            lines[0] = line.into();
            let file = write_csv(&lines);
            let mut c = config(file.path());
            c.demographic.min_age = 30;
            let err = c.validate().unwrap().import(&mut rng).unwrap_err();
            assert_eq!(err.kind(), Some(ErrorKind::File), "{column}");
            assert!(err.to_string().contains(&format!("{column} cell is blank")), "{err}");
        }

        // unconfigured columns may stay empty
        let mut lines = rows();
        lines[0] = "05/03/2019 10:00,CHHS,1,,patient note,1".into();
        let file = write_csv(&lines);
        let mut c = config(file.path());
        c.columns.age = None;
        let import = c.validate().unwrap().import(&mut rng).unwrap();
        assert_eq!(import.train.len() + import.test.len(), 16);
    }

    #[test]
    fn demographic_filter_applies_before_extraction() {
        let file = write_csv(&rows());
        let mut c = config(file.path());
        c.demographic.hospital = "CHPB".into();
        c.train.size = 4;
        c.test.size = 3;
        let import = c.validate().unwrap().import(&mut StdRng::seed_from_u64(2)).unwrap();
        assert!(
            import
                .train
                .records()
                .iter()
                .chain(import.test.records())
                .all(|r| r.hospital.as_deref() == Some("CHPB"))
        );

        c.train.size = 8;
        let err = c.validate().unwrap().import(&mut StdRng::seed_from_u64(2)).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MoreDataThanRecords));
    }

    #[test]
    fn tab_separated_files_are_read() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Text\tFlag").unwrap();
        for i in 0..8 {
            writeln!(file, "note, with comma {i}\t{}", i % 2).unwrap();
        }
        let c = ImportConfig {
            files: vec![file.path().to_path_buf()],
            file_type: "TSV".into(),
            columns: ColumnLabels {
                text: vec!["Text".into()],
                flag: "Flag".into(),
                ..Default::default()
            },
            demographic: DemographicConfig::default(),
            train: PartitionConfig {
                size: 4,
                distribution: "RANDOMBLOCK".into(),
                positive_fraction: Some(0.5),
            },
            test: PartitionConfig {
                size: 4,
                distribution: "UNIFORM".into(),
                positive_fraction: None,
            },
        };
        let import = c.validate().unwrap().import(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(import.train.positives(), 2);
        assert_eq!(import.test.len(), 4);
        assert!(import.train.records()[0].texts[0].starts_with("note, with comma"));
    }
}
