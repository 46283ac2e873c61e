// src/period.rs

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Matches the quarter token in filing filenames, e.g. "bhcf2106.csv".
static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bhcf(\d{2})(\d{2})").expect("filename regex should be valid"));

/// Two-digit years below this resolve to the 2000s, the rest to the 1900s.
const PIVOT_YEAR: i32 = 50;

/// A fiscal quarter a filing covers, e.g. 2021Q2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    quarter: u32,
}

impl Period {
    pub fn new(year: i32, quarter: u32) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            bail!("invalid quarter {}: must be 1-4", quarter);
        }
        Ok(Self { year, quarter })
    }

    /// Derive the period from a filing filename of the form
    /// `bhcf<YY><MM>.<ext>` where MM is a quarter-end month (03/06/09/12).
    pub fn from_filename(name: &str) -> Result<Self> {
        let caps = FILENAME_RE
            .captures(name)
            .ok_or_else(|| anyhow!("filename does not match bhcfYYMM convention: {}", name))?;

        let yy: i32 = caps[1].parse()?;
        let year = if yy < PIVOT_YEAR { 2000 + yy } else { 1900 + yy };

        let quarter = match &caps[2] {
            "03" => 1,
            "06" => 2,
            "09" => 3,
            "12" => 4,
            other => bail!("invalid quarter-end month {:?} in filename {}", other, name),
        };

        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u32 {
        self.quarter
    }

    /// Calendar date at the end of the quarter (Mar 31, Jun 30, Sep 30, Dec 31).
    pub fn end_date(&self) -> NaiveDate {
        let (month, day) = match self.quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        NaiveDate::from_ymd_opt(self.year, month, day).expect("quarter-end date must be valid")
    }

    /// Archive naming token, e.g. "2021Q2".
    pub fn label(&self) -> String {
        format!("{}Q{}", self.year, self.quarter)
    }

    /// Filename token, e.g. "2106" for 2021 Q2.
    pub fn quarter_code(&self) -> String {
        format!("{:02}{:02}", self.year.rem_euclid(100), self.quarter * 3)
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_filename() -> Result<()> {
        let p = Period::from_filename("bhcf2106.csv")?;
        assert_eq!(p.year(), 2021);
        assert_eq!(p.quarter(), 2);
        assert_eq!(p.end_date(), NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
        Ok(())
    }

    #[test]
    fn parses_legacy_filename_with_pivot() -> Result<()> {
        let p = Period::from_filename("bhcf8609.csv")?;
        assert_eq!(p.year(), 1986);
        assert_eq!(p.end_date(), NaiveDate::from_ymd_opt(1986, 9, 30).unwrap());
        Ok(())
    }

    #[test]
    fn pivot_boundary_at_fifty() -> Result<()> {
        assert_eq!(Period::from_filename("bhcf4912.csv")?.year(), 2049);
        assert_eq!(Period::from_filename("bhcf5012.csv")?.year(), 1950);
        Ok(())
    }

    #[test]
    fn prefix_is_case_insensitive() -> Result<()> {
        let p = Period::from_filename("BHCF2103.CSV")?;
        assert_eq!(p.label(), "2021Q1");
        Ok(())
    }

    #[test]
    fn rejects_non_quarter_month() {
        assert!(Period::from_filename("bhcf2104.csv").is_err());
    }

    #[test]
    fn rejects_unrelated_filename() {
        let err = Period::from_filename("notes.txt").unwrap_err();
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn quarter_end_dates() -> Result<()> {
        assert_eq!(
            Period::new(2020, 1)?.end_date(),
            NaiveDate::from_ymd_opt(2020, 3, 31).unwrap()
        );
        assert_eq!(
            Period::new(2020, 4)?.end_date(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
        );
        Ok(())
    }

    #[test]
    fn ordering_and_next() -> Result<()> {
        let q4 = Period::new(2020, 4)?;
        let q1 = q4.next();
        assert_eq!(q1, Period::new(2021, 1)?);
        assert!(q4 < q1);
        Ok(())
    }

    #[test]
    fn quarter_code_round_trips() -> Result<()> {
        assert_eq!(Period::new(2021, 1)?.quarter_code(), "2103");
        assert_eq!(Period::new(1986, 3)?.quarter_code(), "8609");
        Ok(())
    }
}
