//! Records, data sets and the demographic filter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Outcome flag of a record. Only [`FLAG_NEGATIVE`] and [`FLAG_POSITIVE`] are valid.
pub type Flag = u8;

pub const FLAG_NEGATIVE: Flag = 0;
pub const FLAG_POSITIVE: Flag = 1;

/// Whether `value` belongs to the flag vocabulary.
pub fn is_flag(value: Flag) -> bool {
    value == FLAG_NEGATIVE || value == FLAG_POSITIVE
}

/// Sex code used by the source data: 1 is male, 2 is female.
pub const SEX_CODE_MALE: i64 = 1;
pub const SEX_CODE_FEMALE: i64 = 2;

/// A single presentation: free text fields, demographic attributes and a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub presented: Option<NaiveDateTime>,
    pub hospital: Option<String>,
    pub sex: Option<i64>,
    pub age: Option<f64>,
    pub texts: Vec<String>,
    pub flag: Flag,
}

impl Record {
    /// A record with only text and a flag.
    pub fn from_texts(texts: Vec<String>, flag: Flag) -> Self {
        Self {
            presented: None,
            hospital: None,
            sex: None,
            age: None,
            texts,
            flag,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.presented.map(|date| date.year())
    }

    pub fn is_positive(&self) -> bool {
        self.flag == FLAG_POSITIVE
    }

    /// All text fields joined into one document.
    pub fn corpus_text(&self) -> String {
        self.texts.join(" ")
    }
}

/// Which sexes a demographic includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SexFilter {
    #[default]
    All,
    Male,
    Female,
}

impl FromStr for SexFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ALL" => Ok(SexFilter::All),
            "MALE" => Ok(SexFilter::Male),
            "FEMALE" => Ok(SexFilter::Female),
            other => Err(Error::invalid(
                ErrorKind::Sex,
                format!("sex must be \"ALL\", \"MALE\" or \"FEMALE\", got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for SexFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SexFilter::All => "ALL",
            SexFilter::Male => "MALE",
            SexFilter::Female => "FEMALE",
        })
    }
}

/// Demographic bounds as supplied by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicConfig {
    pub min_age: i64,
    pub max_age: i64,
    /// `"ALL"` or one of `known_hospitals`.
    pub hospital: String,
    pub known_hospitals: Vec<String>,
    pub sex: SexFilter,
    pub min_year: i32,
    pub max_year: i32,
    /// Years the source data covers; both year bounds must fall inside.
    pub year_range: (i32, i32),
}

impl Default for DemographicConfig {
    fn default() -> Self {
        Self {
            min_age: 0,
            max_age: 150,
            hospital: "ALL".to_string(),
            known_hospitals: vec!["CHHS".to_string(), "CHPB".to_string()],
            sex: SexFilter::All,
            min_year: 2015,
            max_year: 2022,
            year_range: (2015, 2022),
        }
    }
}

impl DemographicConfig {
    /// Check every bound and build the filter.
    pub fn validate(&self) -> Result<Demographic> {
        if self.min_age < 0 {
            return Err(Error::invalid(
                ErrorKind::MinAge,
                format!("minimum age cannot be less than 0, got {}", self.min_age),
            ));
        }
        if self.max_age < self.min_age {
            return Err(Error::invalid(
                ErrorKind::MaxAge,
                format!(
                    "maximum age {} cannot be less than minimum age {}",
                    self.max_age, self.min_age
                ),
            ));
        }

        let hospital = if self.hospital == "ALL" {
            None
        } else if self.known_hospitals.contains(&self.hospital) {
            Some(self.hospital.clone())
        } else {
            return Err(Error::invalid(
                ErrorKind::Hospital,
                format!(
                    "hospital must be \"ALL\" or one of {:?}, got {:?}",
                    self.known_hospitals, self.hospital
                ),
            ));
        };

        let (first, last) = self.year_range;
        if !(first..=last).contains(&self.min_year) {
            return Err(Error::invalid(
                ErrorKind::MinYear,
                format!("minimum year must be in the range {first} to {last}, got {}", self.min_year),
            ));
        }
        if !(first..=last).contains(&self.max_year) {
            return Err(Error::invalid(
                ErrorKind::MaxYear,
                format!("maximum year must be in the range {first} to {last}, got {}", self.max_year),
            ));
        }
        if self.max_year < self.min_year {
            return Err(Error::invalid(
                ErrorKind::MinMaxYear,
                format!(
                    "maximum year {} cannot be less than minimum year {}",
                    self.max_year, self.min_year
                ),
            ));
        }

        Ok(Demographic {
            min_age: self.min_age as f64,
            max_age: self.max_age as f64,
            hospital,
            sex: self.sex,
            min_year: self.min_year,
            max_year: self.max_year,
        })
    }
}

/// A validated demographic filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Demographic {
    min_age: f64,
    max_age: f64,
    hospital: Option<String>,
    sex: SexFilter,
    min_year: i32,
    max_year: i32,
}

impl Demographic {
    /// Whether the record's patient falls inside the demographic.
    ///
    /// Attributes the record does not carry are not checked.
    pub fn contains(&self, record: &Record) -> bool {
        if let Some(year) = record.year() {
            if year < self.min_year || year > self.max_year {
                return false;
            }
        }
        if let (Some(wanted), Some(hospital)) = (&self.hospital, &record.hospital) {
            if wanted != hospital {
                return false;
            }
        }
        if let Some(code) = record.sex {
            let keep = match self.sex {
                SexFilter::All => true,
                SexFilter::Male => code == SEX_CODE_MALE,
                SexFilter::Female => code == SEX_CODE_FEMALE,
            };
            if !keep {
                return false;
            }
        }
        if let Some(age) = record.age {
            if age < self.min_age || age > self.max_age {
                return false;
            }
        }
        true
    }
}

/// Column labels shared by every record of a data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinitions {
    pub text_columns: Vec<String>,
    pub flag_column: String,
}

/// An immutable, validated collection of records.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    fields: FieldDefinitions,
    records: Vec<Record>,
}

impl DataSet {
    pub fn new(fields: FieldDefinitions, records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::invalid(
                ErrorKind::EmptyFlagsVectors,
                "a data set needs at least one record",
            ));
        }
        for (index, record) in records.iter().enumerate() {
            if !is_flag(record.flag) {
                return Err(Error::invalid(
                    ErrorKind::BadActualFlag,
                    format!("record {index} has flag {} outside (0,1)", record.flag),
                ));
            }
            if record.texts.len() != fields.text_columns.len() {
                return Err(Error::invalid(
                    ErrorKind::TimesSpacesNotEqual,
                    format!(
                        "record {index} has {} text fields but {} text columns are defined",
                        record.texts.len(),
                        fields.text_columns.len()
                    ),
                ));
            }
        }
        Ok(Self { fields, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn fields(&self) -> &FieldDefinitions {
        &self.fields
    }

    pub fn flags(&self) -> Vec<Flag> {
        self.records.iter().map(|r| r.flag).collect()
    }

    pub fn positives(&self) -> usize {
        self.records.iter().filter(|r| r.is_positive()).count()
    }

    /// Number of distinct flags present.
    pub fn class_count(&self) -> usize {
        let positives = self.positives();
        usize::from(positives > 0) + usize::from(positives < self.records.len())
    }

    /// Train and test sets must describe the same fields.
    pub fn ensure_compatible(&self, other: &DataSet) -> Result<()> {
        if self.fields != other.fields {
            return Err(Error::invalid(
                ErrorKind::TrainVectorsFlagsNotEqual,
                format!(
                    "field definitions differ: {:?} vs {:?}",
                    self.fields, other.fields
                ),
            ));
        }
        Ok(())
    }

    pub fn summary(&self) -> DemographicSummary {
        DemographicSummary::of(&self.records)
    }
}

/// Aggregate demographics of a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicSummary {
    pub records: usize,
    pub positives: usize,
    pub negatives: usize,
    pub min_age: Option<f64>,
    pub max_age: Option<f64>,
    pub mean_age: Option<f64>,
    pub by_sex: BTreeMap<String, usize>,
    pub by_hospital: BTreeMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
}

impl DemographicSummary {
    pub fn of(records: &[Record]) -> Self {
        let mut summary = DemographicSummary {
            records: records.len(),
            ..Default::default()
        };
        let mut age_sum = 0.0;
        let mut age_count = 0usize;

        for record in records {
            if record.is_positive() {
                summary.positives += 1;
            } else {
                summary.negatives += 1;
            }
            if let Some(age) = record.age {
                summary.min_age = Some(summary.min_age.map_or(age, |m| m.min(age)));
                summary.max_age = Some(summary.max_age.map_or(age, |m| m.max(age)));
                age_sum += age;
                age_count += 1;
            }
            if let Some(code) = record.sex {
                let key = match code {
                    SEX_CODE_MALE => "MALE",
                    SEX_CODE_FEMALE => "FEMALE",
                    _ => "OTHER",
                };
                *summary.by_sex.entry(key.to_string()).or_insert(0) += 1;
            }
            if let Some(hospital) = &record.hospital {
                *summary.by_hospital.entry(hospital.clone()).or_insert(0) += 1;
            }
            if let Some(year) = record.year() {
                *summary.by_year.entry(year).or_insert(0) += 1;
            }
        }

        if age_count > 0 {
            summary.mean_age = Some(age_sum / age_count as f64);
        }
        summary
    }
}

impl fmt::Display for DemographicSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "records: {} (positive: {}, negative: {})",
            self.records, self.positives, self.negatives
        )?;
        if let (Some(min), Some(max), Some(mean)) = (self.min_age, self.max_age, self.mean_age) {
            writeln!(f, "age: {min:.0}-{max:.0} (mean {mean:.1})")?;
        }
        for (sex, count) in &self.by_sex {
            writeln!(f, "sex {sex}: {count}")?;
        }
        for (hospital, count) in &self.by_hospital {
            writeln!(f, "hospital {hospital}: {count}")?;
        }
        for (year, count) in &self.by_year {
            writeln!(f, "year {year}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(year: i32, hospital: &str, sex: i64, age: f64, flag: Flag) -> Record {
        Record {
            presented: NaiveDate::from_ymd_opt(year, 3, 1).and_then(|d| d.and_hms_opt(10, 0, 0)),
            hospital: Some(hospital.to_string()),
            sex: Some(sex),
            age: Some(age),
            texts: vec!["note".to_string()],
            flag,
        }
    }

    fn fields() -> FieldDefinitions {
        FieldDefinitions {
            text_columns: vec!["TriageDescription".to_string()],
            flag_column: "SSH_Flag".to_string(),
        }
    }

    #[test]
    fn demographic_bounds_are_validated() {
        let bad = |f: fn(&mut DemographicConfig)| {
            let mut config = DemographicConfig::default();
            f(&mut config);
            config.validate().unwrap_err().kind()
        };
        assert_eq!(bad(|c| c.min_age = -1), Some(ErrorKind::MinAge));
        assert_eq!(bad(|c| c.max_age = -5), Some(ErrorKind::MaxAge));
        assert_eq!(bad(|c| c.hospital = "XYZ".into()), Some(ErrorKind::Hospital));
        assert_eq!(bad(|c| c.min_year = 2014), Some(ErrorKind::MinYear));
        assert_eq!(bad(|c| c.max_year = 2023), Some(ErrorKind::MaxYear));
        assert_eq!(
            bad(|c| {
                c.min_year = 2020;
                c.max_year = 2018;
            }),
            Some(ErrorKind::MinMaxYear)
        );
        assert_eq!("BOTH".parse::<SexFilter>().unwrap_err().kind(), Some(ErrorKind::Sex));
    }

    #[test]
    fn demographic_filters_records() {
        let demographic = DemographicConfig {
            min_age: 18,
            max_age: 65,
            hospital: "CHHS".into(),
            sex: SexFilter::Female,
            min_year: 2017,
            max_year: 2019,
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert!(demographic.contains(&record(2018, "CHHS", 2, 30.0, 0)));
        assert!(!demographic.contains(&record(2016, "CHHS", 2, 30.0, 0)));
        assert!(!demographic.contains(&record(2018, "CHPB", 2, 30.0, 0)));
        assert!(!demographic.contains(&record(2018, "CHHS", 1, 30.0, 0)));
        assert!(!demographic.contains(&record(2018, "CHHS", 2, 70.0, 0)));
        // unconfigured attributes are not checked
        assert!(demographic.contains(&Record::from_texts(vec!["x".into()], 1)));
    }

    #[test]
    fn data_set_rejects_empty_and_bad_flags() {
        let err = DataSet::new(fields(), vec![]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::EmptyFlagsVectors));

        let err = DataSet::new(fields(), vec![Record::from_texts(vec!["a".into()], 3)]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadActualFlag));

        let err = DataSet::new(fields(), vec![Record::from_texts(vec![], 1)]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TimesSpacesNotEqual));
    }

    #[test]
    fn data_sets_with_different_fields_are_incompatible() {
        let train = DataSet::new(fields(), vec![record(2018, "CHHS", 1, 20.0, 1)]).unwrap();
        let mut other_fields = fields();
        other_fields.flag_column = "Other".into();
        let test = DataSet::new(other_fields, vec![record(2018, "CHHS", 1, 20.0, 0)]).unwrap();
        assert_eq!(
            train.ensure_compatible(&test).unwrap_err().kind(),
            Some(ErrorKind::TrainVectorsFlagsNotEqual)
        );
    }

    #[test]
    fn summary_counts_demographics() {
        let records = vec![
            record(2018, "CHHS", 1, 20.0, 1),
            record(2018, "CHPB", 2, 40.0, 0),
            record(2019, "CHHS", 2, 60.0, 0),
        ];
        let summary = DataSet::new(fields(), records).unwrap().summary();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.positives, 1);
        assert_eq!(summary.negatives, 2);
        assert_eq!(summary.mean_age, Some(40.0));
        assert_eq!(summary.by_sex["FEMALE"], 2);
        assert_eq!(summary.by_hospital["CHHS"], 2);
        assert_eq!(summary.by_year[&2018], 2);
    }
}
