use regex::Regex;

use crate::cli::args::{CliArgs, Command};
use crate::export::ExportFormat;
use crate::page::PAGE_SIZE_OPTIONS;
use crate::query::SortKey;
use crate::records::{BookingStatus, Collection};

/// Page argument as typed on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageArg {
    Number(usize),
    First,
    Last,
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected a positive integer".to_string());
        }
    }
    match &args.command {
        Command::List(list) => {
            parse_collection(&list.collection)?;
            if let Some(raw) = list.sort.as_deref() {
                parse_sort(raw)?;
            }
            if let Some(size) = list.page_size {
                check_page_size(size)?;
            }
            if let Some(raw) = list.page.as_deref() {
                parse_page(raw)?;
            }
        }
        Command::Export(export) => {
            parse_collection(&export.collection)?;
            if let Some(raw) = export.sort.as_deref() {
                parse_sort(raw)?;
            }
            if let Some(raw) = export.format.as_deref() {
                parse_format(raw)?;
            }
        }
        Command::Browse(browse) => {
            parse_collection(&browse.collection)?;
            if let Some(size) = browse.page_size {
                check_page_size(size)?;
            }
        }
        Command::Create(create) => {
            parse_collection(&create.collection)?;
            if create.data.is_none() && create.data_file.is_none() {
                return Err("create needs a payload, pass --data or --data-file".to_string());
            }
        }
        Command::Update(update) => {
            parse_collection(&update.collection)?;
            if update.id.trim().is_empty() {
                return Err("record id must not be empty".to_string());
            }
            if update.data.is_none() && update.data_file.is_none() {
                return Err("update needs a payload, pass --data or --data-file".to_string());
            }
        }
        Command::SetStatus(set_status) => {
            if set_status.id.trim().is_empty() {
                return Err("booking id must not be empty".to_string());
            }
            parse_status(&set_status.status)?;
        }
        Command::Delete(delete) => {
            parse_collection(&delete.collection)?;
            if delete.id.trim().is_empty() {
                return Err("record id must not be empty".to_string());
            }
        }
        Command::Summary => {}
        Command::Login(login) => {
            validate_login_id(&login.login_id)?;
        }
    }
    Ok(())
}

pub fn parse_collection(raw: &str) -> Result<Collection, String> {
    Collection::parse(raw).ok_or_else(|| {
        format!("invalid collection '{raw}', expected spas, users, bookings, or inquiries")
    })
}

pub fn parse_sort(raw: &str) -> Result<SortKey, String> {
    SortKey::parse(raw).ok_or_else(|| {
        format!("invalid sort key '{raw}', expected name, price-asc, price-desc, discount-desc, or none")
    })
}

pub fn parse_format(raw: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(raw)
        .ok_or_else(|| format!("invalid export format '{raw}', expected csv, table, or json"))
}

pub fn parse_status(raw: &str) -> Result<BookingStatus, String> {
    BookingStatus::parse(raw).ok_or_else(|| {
        format!("invalid status '{raw}', expected pending, confirmed, completed, or cancelled")
    })
}

pub fn check_page_size(size: usize) -> Result<usize, String> {
    if PAGE_SIZE_OPTIONS.contains(&size) {
        Ok(size)
    } else {
        Err(format!(
            "invalid page size '{size}', expected one of 10, 25, 50, or 100"
        ))
    }
}

pub fn parse_page(raw: &str) -> Result<PageArg, String> {
    match raw.trim().to_lowercase().as_str() {
        "first" => Ok(PageArg::First),
        "last" => Ok(PageArg::Last),
        other => other
            .parse::<usize>()
            .ok()
            .filter(|page| *page >= 1)
            .map(PageArg::Number)
            .ok_or_else(|| {
                format!("invalid page '{raw}', expected a positive number, 'first', or 'last'")
            }),
    }
}

pub fn validate_login_id(raw: &str) -> Result<(), String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err("login id must not be empty".to_string());
    }
    if id.contains('@') {
        let email = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .map_err(|e| format!("failed to compile email pattern: {e}"))?;
        if !email.is_match(id) {
            return Err(format!("invalid login id '{id}', expected an email address"));
        }
    } else {
        let phone = Regex::new(r"^\d{10}$")
            .map_err(|e| format!("failed to compile phone pattern: {e}"))?;
        if !phone.is_match(id) {
            return Err(format!(
                "invalid login id '{id}', expected a 10-digit phone number"
            ));
        }
    }
    Ok(())
}

/// Check a mutation payload before it goes on the wire. Create demands
/// the fields the service refuses to accept blank; update only checks
/// the fields that are present.
pub fn validate_payload(
    collection: Collection,
    payload: &serde_json::Value,
    is_create: bool,
) -> Result<(), String> {
    let object = payload
        .as_object()
        .ok_or_else(|| "payload must be a JSON object".to_string())?;
    let text_field = |key: &str| {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    match collection {
        Collection::Spas => {
            if is_create && text_field("name").is_none() {
                return Err("spa payload needs a non-empty 'name'".to_string());
            }
            if is_create && object.get("startingPrice").is_none() {
                return Err("spa payload needs a 'startingPrice'".to_string());
            }
            if let Some(price) = object.get("startingPrice") {
                if !price.as_f64().map(|p| p > 0.0).unwrap_or(false) {
                    return Err("'startingPrice' must be a number greater than zero".to_string());
                }
            }
            if let Some(discount) = object.get("discount") {
                if !discount
                    .as_f64()
                    .map(|d| (0.0..=100.0).contains(&d))
                    .unwrap_or(false)
                {
                    return Err("'discount' must be a number between 0 and 100".to_string());
                }
            }
        }
        Collection::Users => {
            let email = text_field("email");
            if is_create && email.is_none() {
                return Err("user payload needs a non-empty 'email'".to_string());
            }
            if let Some(email) = email {
                let pattern = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
                    .map_err(|e| format!("failed to compile email pattern: {e}"))?;
                if !pattern.is_match(email) {
                    return Err(format!("invalid 'email' value '{email}'"));
                }
            }
        }
        Collection::Bookings => {
            if is_create && text_field("name").is_none() {
                return Err("booking payload needs a non-empty 'name'".to_string());
            }
            if let Some(raw) = object.get("status").and_then(|v| v.as_str()) {
                parse_status(raw)?;
            }
        }
        Collection::Inquiries => {
            if is_create && text_field("name").is_none() {
                return Err("inquiry payload needs a non-empty 'name'".to_string());
            }
        }
    }
    Ok(())
}
