use std::fmt;

use chrono::{DateTime, Utc};
use colored::Color;
use serde::{Deserialize, Deserializer, Serialize};

use crate::export::Exportable;
use crate::query::{FilterFlag, NumericField, Queryable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Spas,
    Users,
    Bookings,
    Inquiries,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Spas,
        Collection::Users,
        Collection::Bookings,
        Collection::Inquiries,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "spas" | "spa" => Some(Self::Spas),
            "users" | "user" => Some(Self::Users),
            "bookings" | "booking" => Some(Self::Bookings),
            "inquiries" | "inquiry" => Some(Self::Inquiries),
            _ => None,
        }
    }

    /// REST path segment under the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Spas => "spas",
            Self::Users => "users",
            Self::Bookings => "bookings",
            Self::Inquiries => "inquiries",
        }
    }

    pub fn export_stem(&self) -> &'static str {
        match self {
            Self::Spas => "spas_list",
            Self::Users => "users_list",
            Self::Bookings => "bookings_list",
            Self::Inquiries => "inquiries_list",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal styling per status. One table, no string interpolation.
    pub fn color(&self) -> Color {
        match self {
            Self::Completed => Color::Green,
            Self::Cancelled => Color::Red,
            Self::Confirmed => Color::Cyan,
            Self::Pending => Color::Yellow,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Some deployments store phone numbers as JSON numbers, older ones as
// strings. Normalize to a string either way; null becomes empty.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => String::new(),
        Some(Raw::Text(s)) => s,
        Some(Raw::Int(n)) => n.to_string(),
        Some(Raw::Float(n)) => n.to_string(),
    })
}

fn format_date(date: &Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%m/%d/%Y").to_string(),
        None => "N/A".to_string(),
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaLocation {
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub district: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaContacts {
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spa {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: SpaLocation,
    #[serde(default)]
    pub contacts: SpaContacts,
    #[serde(rename = "startingPrice", default)]
    pub starting_price: f64,
    #[serde(default)]
    pub discount: f64,
}

impl Queryable for Spa {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.location.locality, &self.location.district]
    }

    fn numeric_field(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Price => Some(self.starting_price),
            NumericField::Discount => Some(self.discount),
        }
    }

    fn filter_flag(&self, flag: FilterFlag) -> bool {
        match flag {
            FilterFlag::Discounted => self.discount > 0.0,
        }
    }
}

impl Exportable for Spa {
    fn headers() -> &'static [&'static str] {
        &[
            "Name",
            "Locality",
            "District",
            "Starting Price",
            "Discount",
            "Phone",
            "Website",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.location.locality.clone(),
            self.location.district.clone(),
            self.starting_price.to_string(),
            format!("{}%", self.discount),
            self.contacts.phone.clone(),
            self.contacts.website.clone(),
        ]
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub phone: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub spa: Option<SpaRef>,
    // field name typo is what the service actually sends
    #[serde(rename = "serviceTital", default)]
    pub service_title: String,
    #[serde(default)]
    pub special_request: String,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

impl Booking {
    pub fn spa_name(&self) -> &str {
        self.spa
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("N/A")
    }

    /// Bookings created before statuses existed carry none; the service
    /// treats those as pending.
    pub fn status_label(&self) -> &'static str {
        match self.status {
            Some(status) => status.as_str(),
            None => BookingStatus::Pending.as_str(),
        }
    }

    pub fn status_color(&self) -> Color {
        match self.status {
            Some(status) => status.color(),
            None => Color::Yellow,
        }
    }
}

impl Queryable for Booking {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.name.as_str(),
            self.phone.as_str(),
            self.service_title.as_str(),
        ];
        if let Some(spa) = self.spa.as_ref() {
            fields.push(spa.name.as_str());
        }
        fields
    }

    fn numeric_field(&self, _field: NumericField) -> Option<f64> {
        None
    }
}

impl Exportable for Booking {
    fn headers() -> &'static [&'static str] {
        &[
            "Customer Name",
            "Phone",
            "Date",
            "Time",
            "Spa Name",
            "Service",
            "Special Request",
            "Status",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.phone.clone(),
            format_date(&self.date),
            self.time.clone(),
            self.spa_name().to_string(),
            self.service_title.clone(),
            self.special_request.clone(),
            self.status_label().to_string(),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub phone: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Queryable for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.first_name, &self.last_name, &self.email, &self.phone]
    }

    fn numeric_field(&self, _field: NumericField) -> Option<f64> {
        None
    }
}

impl Exportable for User {
    fn headers() -> &'static [&'static str] {
        &["First Name", "Last Name", "Email", "Phone", "Joined"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.first_name.clone(),
            self.last_name.clone(),
            self.email.clone(),
            self.phone.clone(),
            format_date(&self.created_at),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inquiry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub phone: String,
}

impl Queryable for Inquiry {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.phone]
    }

    fn numeric_field(&self, _field: NumericField) -> Option<f64> {
        None
    }
}

impl Exportable for Inquiry {
    fn headers() -> &'static [&'static str] {
        &["Name", "Phone"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![self.name.clone(), self.phone.clone()]
    }
}
