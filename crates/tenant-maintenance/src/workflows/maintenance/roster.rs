//! Vendor roster import from a registry CSV export.
//!
//! Expected headers: `Vendor ID`, `Name`, `Categories`, `Regions`, `Tags`,
//! `Hourly Rate`, `24/7`, `Status`, `Completed Jobs`. List columns are
//! separated by `;` or `|`.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{Money, Vendor, VendorId, VendorJob, VendorStatus, WorkOrderId, WorkOrderStatus};

#[derive(Debug)]
pub enum VendorRosterError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
}

impl std::fmt::Display for VendorRosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VendorRosterError::Io(err) => write!(f, "failed to read vendor roster: {}", err),
            VendorRosterError::Csv(err) => write!(f, "invalid vendor roster CSV data: {}", err),
            VendorRosterError::InvalidRow { line, message } => {
                write!(f, "vendor roster line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for VendorRosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VendorRosterError::Io(err) => Some(err),
            VendorRosterError::Csv(err) => Some(err),
            VendorRosterError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for VendorRosterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for VendorRosterError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Upper bound on the `Completed Jobs` column; one history record is kept per job.
pub const MAX_COMPLETED_JOBS: usize = 10_000;

pub struct VendorRosterImporter;

impl VendorRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Vendor>, VendorRosterError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Vendor>, VendorRosterError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut vendors = Vec::new();

        for (index, record) in csv_reader.deserialize::<VendorRow>().enumerate() {
            let row = record?;
            // Header is line 1.
            let line = index as u64 + 2;
            vendors.push(row.into_vendor(line)?);
        }

        Ok(vendors)
    }
}

#[derive(Debug, Deserialize)]
struct VendorRow {
    #[serde(rename = "Vendor ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Categories", default, deserialize_with = "empty_string_as_none")]
    categories: Option<String>,
    #[serde(rename = "Regions", default, deserialize_with = "empty_string_as_none")]
    regions: Option<String>,
    #[serde(rename = "Tags", default, deserialize_with = "empty_string_as_none")]
    tags: Option<String>,
    #[serde(rename = "Hourly Rate", default, deserialize_with = "empty_string_as_none")]
    hourly_rate: Option<String>,
    #[serde(rename = "24/7", default, deserialize_with = "empty_string_as_none")]
    availability_247: Option<String>,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(rename = "Completed Jobs", default, deserialize_with = "empty_string_as_none")]
    completed_jobs: Option<String>,
}

impl VendorRow {
    fn into_vendor(self, line: u64) -> Result<Vendor, VendorRosterError> {
        let invalid = |message: String| VendorRosterError::InvalidRow { line, message };

        if self.id.trim().is_empty() {
            return Err(invalid("missing vendor id".to_string()));
        }

        let default_hourly_rate = match self.hourly_rate.as_deref() {
            Some(raw) => parse_money(raw).ok_or_else(|| invalid(format!("invalid hourly rate '{raw}'")))?,
            None => Money::ZERO,
        };

        let status = match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("active") => VendorStatus::Active,
            Some("archived") => VendorStatus::Archived,
            Some("blacklisted") => VendorStatus::Blacklisted,
            Some(other) => return Err(invalid(format!("unknown status '{other}'"))),
        };

        let completed_jobs: usize = match self.completed_jobs.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid(format!("invalid completed job count '{raw}'")))?,
            None => 0,
        };
        if completed_jobs > MAX_COMPLETED_JOBS {
            return Err(invalid(format!(
                "completed job count {completed_jobs} exceeds {MAX_COMPLETED_JOBS}"
            )));
        }

        let work_orders = (1..=completed_jobs)
            .map(|n| VendorJob {
                work_order_id: WorkOrderId(format!("{}-history-{n}", self.id)),
                status: WorkOrderStatus::Completed,
            })
            .collect();

        Ok(Vendor {
            id: VendorId(self.id),
            name: self.name,
            categories: split_list(self.categories.as_deref()),
            custom_categories: Vec::new(),
            regions: split_list(self.regions.as_deref()),
            tags: split_list(self.tags.as_deref()),
            default_hourly_rate,
            availability_247: self
                .availability_247
                .as_deref()
                .map(is_truthy)
                .unwrap_or(false),
            status,
            work_orders,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split([';', '|'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

/// Parse `"65"`, `"65.5"`, or `"$65.50"` into cents.
fn parse_money(raw: &str) -> Option<Money> {
    let trimmed = raw.trim().trim_start_matches('$');
    let (dollars, cents) = match trimmed.split_once('.') {
        Some((dollars, cents)) => (dollars, cents),
        None => (trimmed, ""),
    };
    let dollars: u64 = dollars.parse().ok()?;
    let cents: u64 = match cents.len() {
        0 => 0,
        1 => cents.parse::<u64>().ok()? * 10,
        2 => cents.parse().ok()?,
        _ => return None,
    };
    dollars
        .checked_mul(100)
        .and_then(|total| total.checked_add(cents))
        .map(Money::from_cents)
}
