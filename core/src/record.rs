use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const UNNAMED_ITEM: &str = "Unnamed item";
pub const UNSPECIFIED_LOCATION: &str = "Unspecified";
pub const UNASSIGNED: &str = "Unassigned";
pub const DEFAULT_CATEGORY: &str = "General Inventory";
pub const NO_CODE: &str = "S/N";

const CODE_LEN: usize = 10;
const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// One inventory item. Records are never edited in place; every sync builds
/// a fresh collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub quantity: u64,
    pub location: String,
    pub arrival_date: DateTime<Utc>,
    pub responsible: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Record {
    /// Maps positional columns `quantity, name, location, responsible, [link]`
    /// onto a record. Rows with fewer than two columns yield `None`.
    pub fn from_columns(cols: &[String], index: usize, ingested_at: DateTime<Utc>) -> Option<Self> {
        if cols.len() < 2 {
            return None;
        }

        let name = non_empty(cols.get(1));
        Some(Self {
            id: format!("item-{}-{}", ingested_at.timestamp_millis(), index),
            name: name.unwrap_or(UNNAMED_ITEM).to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            quantity: parse_quantity(&cols[0]),
            location: non_empty(cols.get(2))
                .unwrap_or(UNSPECIFIED_LOCATION)
                .to_string(),
            arrival_date: ingested_at,
            responsible: non_empty(cols.get(3)).unwrap_or(UNASSIGNED).to_string(),
            code: name.map(short_code).unwrap_or_else(|| NO_CODE.to_string()),
            link: non_empty(cols.get(4)).map(str::to_string),
        })
    }

    /// Equality on sourced content only. `id` and `arrival_date` are
    /// regenerated by every parse and are ignored.
    pub fn same_content(&self, other: &Record) -> bool {
        self.name == other.name
            && self.quantity == other.quantity
            && self.location == other.location
            && self.responsible == other.responsible
            && self.category == other.category
            && self.code == other.code
            && self.link == other.link
    }

    pub fn time_in_inventory(&self, now: DateTime<Utc>) -> String {
        time_in_inventory(self.arrival_date, now)
    }
}

pub fn same_contents(left: &[Record], right: &[Record]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(left, right)| left.same_content(right))
}

/// Keeps only ASCII digits and parses the rest. A leading minus sign is a
/// non-digit like any other, so `"-5"` reads as 5. Anything unparseable
/// (no digits, overflow) is 0.
pub fn parse_quantity(raw: &str) -> u64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

pub fn short_code(name: &str) -> String {
    name.chars().take(CODE_LEN).collect::<String>().to_uppercase()
}

/// Human readable age of an item: days under a month, then months, then years.
pub fn time_in_inventory(arrival: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed_ms = (now - arrival).num_milliseconds().unsigned_abs();
    let days = elapsed_ms.div_ceil(MS_PER_DAY);
    if days < 30 {
        format!("{days} days")
    } else if days < 365 {
        format!("{} months", days / 30)
    } else {
        format!("{} years", days / 365)
    }
}

/// Demonstration collection used until the first sync succeeds.
pub fn seed_inventory() -> Vec<Record> {
    vec![
        seed(
            "1",
            "Laptop Dell XPS 15",
            "Electronics",
            12,
            "Central Warehouse - Aisle A1",
            seed_date(2023, 11, 15, 9, 0),
            "Juan Pérez",
            "DELL-XPS-001",
        ),
        seed(
            "2",
            "Monitor LG 27\" 4K",
            "Peripherals",
            25,
            "North Office - Floor 2",
            seed_date(2024, 1, 20, 14, 30),
            "María García",
            "LG-MON-27",
        ),
        seed(
            "3",
            "Ergonomic Chair Pro",
            "Furniture",
            45,
            "Secondary Warehouse - Zone C",
            seed_date(2023, 8, 5, 11, 0),
            "Carlos Rodríguez",
            "CHAIR-ERG-PRO",
        ),
        seed(
            "4",
            "Mechanical Keyboard RGB",
            "Peripherals",
            150,
            "Central Warehouse - Aisle B2",
            seed_date(2024, 2, 10, 8, 15),
            "Ana Martínez",
            "KBD-MECH-RGB",
        ),
        seed(
            "5",
            "Router Cisco ISR 4331",
            "Networking",
            5,
            "Data Center - Rack 4",
            seed_date(2023, 5, 12, 16, 45),
            "Luis Sánchez",
            "CSCO-RTR-4331",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn seed(
    id: &str,
    name: &str,
    category: &str,
    quantity: u64,
    location: &str,
    arrival_date: DateTime<Utc>,
    responsible: &str,
    code: &str,
) -> Record {
    Record {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        quantity,
        location: location.to_string(),
        arrival_date,
        responsible: responsible.to_string(),
        code: code.to_string(),
        link: None,
    }
}

fn seed_date(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cols(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn quantity_strips_non_digits() {
        assert_eq!(parse_quantity("12 units"), 12);
        assert_eq!(parse_quantity("abc"), 0);
        assert_eq!(parse_quantity("-5"), 5);
        assert_eq!(parse_quantity("1.5"), 15);
        assert_eq!(parse_quantity(""), 0);
        assert_eq!(parse_quantity("99999999999999999999999"), 0);
    }

    #[test]
    fn short_rows_are_dropped() {
        let now = Utc::now();
        assert!(Record::from_columns(&cols(&["5"]), 0, now).is_none());
        assert!(Record::from_columns(&[], 0, now).is_none());
    }

    #[test]
    fn missing_columns_use_placeholders() {
        let now = Utc::now();
        let record = Record::from_columns(&cols(&["3", ""]), 7, now).unwrap();
        assert_eq!(record.name, UNNAMED_ITEM);
        assert_eq!(record.code, NO_CODE);
        assert_eq!(record.location, UNSPECIFIED_LOCATION);
        assert_eq!(record.responsible, UNASSIGNED);
        assert_eq!(record.category, DEFAULT_CATEGORY);
        assert_eq!(record.link, None);
        assert_eq!(record.arrival_date, now);
        assert_eq!(record.id, format!("item-{}-7", now.timestamp_millis()));
    }

    #[test]
    fn fifth_column_is_the_document_link() {
        let now = Utc::now();
        let record = Record::from_columns(
            &cols(&["1", "Projector", "Room 4", "Eva", "https://drive.example/doc"]),
            0,
            now,
        )
        .unwrap();
        assert_eq!(record.link.as_deref(), Some("https://drive.example/doc"));
        assert_eq!(record.code, "PROJECTOR");
    }

    #[test]
    fn content_equality_ignores_id_and_arrival() {
        let first = Record::from_columns(&cols(&["5", "Laptop", "Almacen", "Ana"]), 0, Utc::now()).unwrap();
        let later = Utc::now() + Duration::seconds(90);
        let second = Record::from_columns(&cols(&["5", "Laptop", "Almacen", "Ana"]), 0, later).unwrap();
        assert_ne!(first, second);
        assert!(first.same_content(&second));
        assert!(same_contents(&[first.clone()], &[second]));
        assert!(!same_contents(&[first.clone()], &[first.clone(), first]));
    }

    #[test]
    fn tenure_buckets() {
        let now = Utc::now();
        assert_eq!(time_in_inventory(now - Duration::days(3), now), "3 days");
        assert_eq!(time_in_inventory(now - Duration::hours(1), now), "1 days");
        assert_eq!(time_in_inventory(now - Duration::days(95), now), "3 months");
        assert_eq!(time_in_inventory(now - Duration::days(800), now), "2 years");
        assert_eq!(time_in_inventory(now + Duration::days(3), now), "3 days");
    }

    #[test]
    fn stored_records_round_trip_with_camel_case_keys() {
        let record = seed_inventory().remove(0);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"arrivalDate\""));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
