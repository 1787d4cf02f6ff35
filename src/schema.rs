//! Canonical schema registry for the two record families.
//!
//! The two families ("state licence" and "registration") each carry a fixed,
//! ordered column set with semantic types. Schemas are immutable configuration:
//! built once via [`schema_for`] and passed explicitly to the reconciler,
//! coercer, and predicate builder. Every family also carries two metadata
//! columns, `source_filename` and `ingestion_timestamp`, stamped at coercion
//! time rather than sourced from uploads.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const SOURCE_FILENAME_COLUMN: &str = "source_filename";
pub const INGESTION_TIMESTAMP_COLUMN: &str = "ingestion_timestamp";

/// Value recorded in `source_filename` when no originating file is known.
pub const MANUAL_UPLOAD_SENTINEL: &str = "manual_upload";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum Family {
    StateLicence,
    Registration,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::StateLicence, Family::Registration];

    pub fn table_name(&self) -> &'static str {
        match self {
            Family::StateLicence => "state_licence",
            Family::Registration => "registration",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
    Date,
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Numeric => "numeric",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub family: Family,
    pub columns: Vec<ColumnMeta>,
}

impl CanonicalSchema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns carrying uploaded data, i.e. everything except the two
    /// ingestion-metadata columns.
    pub fn business_columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| c.name != SOURCE_FILENAME_COLUMN && c.name != INGESTION_TIMESTAMP_COLUMN)
    }
}

const STATE_LICENCE_COLUMNS: &[(&str, ColumnType)] = &[
    ("FBO NAME", ColumnType::Text),
    ("ADDRESS", ColumnType::Text),
    ("DISTT", ColumnType::Text),
    ("STATE", ColumnType::Text),
    ("KOB", ColumnType::Text),
    ("CONTACT", ColumnType::Text),
    ("RESPONSIBLE MO", ColumnType::Text),
    ("Y", ColumnType::Text),
    ("REF ID", ColumnType::Text),
    ("AMOUNT", ColumnType::Numeric),
    ("LICENSE", ColumnType::Text),
    ("COMPLIANCE MO", ColumnType::Text),
    ("EXPIRY", ColumnType::Date),
    (SOURCE_FILENAME_COLUMN, ColumnType::Text),
    (INGESTION_TIMESTAMP_COLUMN, ColumnType::DateTime),
];

const REGISTRATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("refId", ColumnType::Text),
    ("certificateNo", ColumnType::Text),
    ("companyName", ColumnType::Text),
    ("addressPremises", ColumnType::Text),
    ("premiseVillageName", ColumnType::Text),
    ("correspondenceDistrictName", ColumnType::Text),
    ("stateName", ColumnType::Text),
    ("contactMobile", ColumnType::Text),
    ("contactPerson", ColumnType::Text),
    ("displayRefId", ColumnType::Text),
    ("kobNameDetails", ColumnType::Text),
    ("productName", ColumnType::Text),
    ("expiryDate", ColumnType::Date),
    ("issuedDate", ColumnType::Date),
    ("talukName", ColumnType::Text),
    ("pincodePremises", ColumnType::Text),
    ("applicantMobileNo", ColumnType::Text),
    ("noOfYears", ColumnType::Numeric),
    ("statusId", ColumnType::Text),
    ("appType", ColumnType::Text),
    ("amount", ColumnType::Numeric),
    (SOURCE_FILENAME_COLUMN, ColumnType::Text),
    (INGESTION_TIMESTAMP_COLUMN, ColumnType::DateTime),
];

pub fn schema_for(family: Family) -> CanonicalSchema {
    let defs = match family {
        Family::StateLicence => STATE_LICENCE_COLUMNS,
        Family::Registration => REGISTRATION_COLUMNS,
    };
    CanonicalSchema {
        family,
        columns: defs
            .iter()
            .map(|(name, data_type)| ColumnMeta {
                name: (*name).to_string(),
                data_type: *data_type,
            })
            .collect(),
    }
}

/// The two columns treated as a compound search key by the dual-key search.
pub fn primary_keys_for(family: Family) -> (&'static str, &'static str) {
    match family {
        Family::StateLicence => ("REF ID", "LICENSE"),
        Family::Registration => ("refId", "certificateNo"),
    }
}

pub fn expiry_column_for(family: Family) -> &'static str {
    match family {
        Family::StateLicence => "EXPIRY",
        Family::Registration => "expiryDate",
    }
}
