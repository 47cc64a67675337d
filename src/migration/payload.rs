//! Sheet rows to API payloads.
//!
//! Rows are JSON objects keyed by column header, one per sheet row. Party
//! sheets map one row to one payload, invoice and credit note sheets group
//! their lines into one document per (legal entity, invoice number).

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

pub const ROW_NUMBER: &str = "row_number";

const GROUP_LEGAL_ENTITY: &str = "LEGAL_ENTITY";
const GROUP_INVOICE_NUMBER: &str = "Invoice Number";

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    #[value(name = "ar_invoice")]
    ArInvoice,
    #[value(name = "ar_credit_note")]
    ArCreditNote,
    #[value(name = "ap_invoice")]
    ApInvoice,
    #[value(name = "ap_credit_note")]
    ApCreditNote,
    #[value(name = "masters_party")]
    MastersParty,
    #[value(name = "le_party")]
    LeParty,
}

/// Sheet name keyword of every kind, matched in this order
const SHEET_KEYWORDS: [(&str, PayloadKind); 6] = [
    ("AR_Invoice", PayloadKind::ArInvoice),
    ("AR_Credit Note", PayloadKind::ArCreditNote),
    ("AP_Invoice", PayloadKind::ApInvoice),
    ("AP_Credit Note", PayloadKind::ApCreditNote),
    ("Masters_Party", PayloadKind::MastersParty),
    ("LE_Party", PayloadKind::LeParty),
];

impl PayloadKind {
    /// Kind of a sheet (or exported file) from the keyword in its name
    pub fn detect(sheet_name: &str) -> Option<Self> {
        SHEET_KEYWORDS
            .iter()
            .find(|(keyword, _)| sheet_name.contains(keyword))
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::ArInvoice => "ar_invoice",
            PayloadKind::ArCreditNote => "ar_credit_note",
            PayloadKind::ApInvoice => "ap_invoice",
            PayloadKind::ApCreditNote => "ap_credit_note",
            PayloadKind::MastersParty => "masters_party",
            PayloadKind::LeParty => "le_party",
        }
    }

    fn is_document(&self) -> bool {
        !matches!(self, PayloadKind::MastersParty | PayloadKind::LeParty)
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim column headers and number the rows in sheet order. A `row_number`
/// already present in the row is kept.
pub fn prepare_rows(raw: Vec<Value>) -> Result<Vec<Row>> {
    raw.into_iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Value::Object(row) => {
                let mut row: Row = row.into_iter().map(|(k, v)| (k.trim().to_owned(), v)).collect();
                row.entry(ROW_NUMBER).or_insert_with(|| json!(idx));
                Ok(row)
            }
            other => Err(anyhow!("row {} is not an object: {}", idx, other)),
        })
        .collect()
}

/// Payloads of one sheet
pub fn generate(kind: PayloadKind, rows: &[Row]) -> Result<Vec<Value>> {
    if rows.is_empty() {
        return Err(anyhow!("sheet of kind '{}' is empty", kind));
    }

    let payloads: Vec<Value> = if kind.is_document() {
        group_documents(rows).into_iter().map(|(_, lines)| document(&lines)).collect()
    } else {
        rows.iter()
            .map(|row| match kind {
                PayloadKind::LeParty => le_party_envelope(row),
                _ => master_party(row),
            })
            .collect()
    };

    debug!(kind = kind.as_str(), rows = rows.len(), payloads = payloads.len(), "payloads generated");
    Ok(payloads)
}

/// Cell as JSON, `default` when the column is missing or the cell is empty
fn cell(row: &Row, column: &str, default: &str) -> Value {
    match row.get(column) {
        None | Some(Value::Null) => Value::String(default.to_owned()),
        Some(Value::String(s)) if s.is_empty() => Value::String(default.to_owned()),
        Some(value) => value.to_owned(),
    }
}

fn cell_text(row: &Row, column: &str) -> String {
    match cell(row, column, "") {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn master_party(row: &Row) -> Value {
    json!({
        "action": "SUBMIT",
        "dunsNumber": cell(row, "DUNS", ""),
        "masterPartyName": cell(row, "Party Name", ""),
        "companyEmail": cell(row, "Company Email", ""),
        "companyWebsite": cell(row, "Company website", ""),
        "companyPhone": cell(row, "Company Phone", ""),
        "activeStatus": cell(row, "Active Status", ""),
        "description": cell(row, "Description", ""),
        "countryOfRegistration": country(""),
        "masterPartyEntityType": cell(row, "Entity Type", ""),
        "companyPhoneCode": cell(row, "Company Phone Code", ""),
    })
}

/// `{payload, masterParty, row_number}` so the sender can log which row
/// and which master party every response belongs to.
fn le_party_envelope(row: &Row) -> Value {
    let is_segment = cell_text(row, "Is party a segment");
    let is_segment = if is_segment.is_empty() { "false".to_owned() } else { is_segment };

    let segment_details = if is_segment.eq_ignore_ascii_case("true") {
        json!({ "uuid": "", "segmentType": cell(row, "Segment Type", "BUSINESS_UNIT") })
    } else {
        json!({})
    };

    let payload = json!({
        "action": "SUBMIT",
        "sourceReferenceId": cell(row, "Source Reference ID", "System_source_reference"),
        "isCustomer": cell(row, "Party Role Customer", "false"),
        "isSupplier": cell(row, "Party Role Supplier", "false"),
        "accessIdentifiers": {
            "legalEntityUUID": cell(row, "Legal Entity UUID", ""),
            "businessUnitUUID": "",
            "locationUUID": "",
        },
        "masterParty": { "guid": cell(row, "Master Party ID", "") },
        "legalEntityPartyType": cell(row, "Party Type", "PNL"),
        "activeStatus": "ACTIVE",
        "legalEntityPartyAddressDetailList": [address(row)],
        "legalEntityPartyContactDetailList": [{
            "name": cell(row, "Contact Name", "System"),
            "countryCode": cell(row, "Contact Phone Code", ""),
            "telephoneNumber": cell(row, "Contact Phone", ""),
            "email": cell(row, "Contact Email", ""),
            "designation": cell(row, "Contact Designation", ""),
            "activeStatus": "ACTIVE",
        }],
        "legalEntityPartyTaxDetailList": [{
            "id": null,
            "guid": null,
            "taxRegimeUUID": cell(row, "Tax Regime Code", ""),
            "taxStartDate": cell(row, "Start Date", ""),
            "taxEndDate": cell(row, "End Date", ""),
            "exemptFromTax": cell(row, "Exempt From Tax", ""),
            "taxRegistrationNumber": cell(row, "Tax Registration Number", ""),
            "activeStatus": cell(row, "Tax Regime Active?", "ACTIVE"),
        }],
        "legalEntityPartyBankDetailList": [{
            "id": null,
            "guid": null,
            "bankAccountName": cell(row, "Bank Account Name", ""),
            "accountNumber": cell(row, "Bank Account Number", ""),
            "branchName": cell(row, "Bank Branch Name", ""),
            "branchNumber": cell(row, "Bank Branch Number", ""),
            "swiftCode": "",
            "ibanCode": cell(row, "IBAN Code", ""),
            "defaultBank": cell(row, "Bank Default", "false"),
            "activeStatus": cell(row, "Bank Active?", "ACTIVE"),
            "bankCountry": country(&cell_text(row, "Bank Country")),
        }],
        "isPartySegment": is_segment,
        "documents": [],
        "deletedDocuments": [],
        "segmentDetails": segment_details,
    });

    json!({
        "payload": payload,
        "masterParty": cell(row, "Master Party ID", ""),
        "row_number": row.get(ROW_NUMBER).cloned().unwrap_or(Value::Null),
    })
}

fn address(row: &Row) -> Value {
    let state = cell(row, "State", "");
    let country_code = cell(row, "Country", "");
    json!({
        "label": cell(row, "Address Label", "System Address"),
        "addressLine1": cell(row, "Address Line 1", ""),
        "addressLine2": cell(row, "Address Line 2", ""),
        "city": {
            "id": "",
            "name": cell(row, "City", ""),
            "stateId": "",
            "stateName": "",
            "stateIso2Code": state,
            "countryId": "",
            "countryName": "",
            "countryIso2Code": country_code,
        },
        "state": {
            "id": "",
            "name": "",
            "iso2Code": state,
            "countryId": "",
            "countryIso2Code": country_code,
            "countryName": "",
        },
        "country": country(&cell_text(row, "Country")),
        "postalCode": cell(row, "Postal Code", ""),
        "activeStatus": cell(row, "Address Active?", ""),
        "shipToSite": cell(row, "Ship to flag", "false"),
        "billToSite": cell(row, "Bill to flag", "false"),
        "supplierSite": cell(row, "Supplier Site", "false"),
    })
}

fn country(iso2: &str) -> Value {
    json!({ "id": "", "name": "", "iso2Code": iso2, "iso3Code": "", "phoneCode": "" })
}

/// Rows sharing (LEGAL_ENTITY, Invoice Number), ordered by that key
fn group_documents(rows: &[Row]) -> BTreeMap<(String, String), Vec<&Row>> {
    let mut groups: BTreeMap<(String, String), Vec<&Row>> = BTreeMap::new();
    for row in rows {
        let key = (cell_text(row, GROUP_LEGAL_ENTITY), cell_text(row, GROUP_INVOICE_NUMBER));
        if key.0.is_empty() || key.1.is_empty() {
            warn!(row_number = ?row.get(ROW_NUMBER), "row without legal entity or invoice number skipped");
            continue;
        }
        groups.entry(key).or_default().push(row);
    }
    groups
}

fn document(lines: &[&Row]) -> Value {
    let first = lines[0];
    json!({
        "Legal Entity": cell_text(first, GROUP_LEGAL_ENTITY),
        "Invoice Number": cell_text(first, GROUP_INVOICE_NUMBER),
        "Transaction Source": cell_text(first, "Transaction Source"),
        "Line": lines.iter().map(|row| cell_text(row, "Line")).collect::<Vec<_>>(),
        "row_number": lines.iter().map(|row| row.get(ROW_NUMBER).cloned().unwrap_or(Value::Null)).collect::<Vec<_>>(),
    })
}
