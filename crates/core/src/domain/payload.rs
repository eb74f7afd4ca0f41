//! Category-specific line data.
//!
//! The editor stores whatever it needs in a line's `raw_json`. The backend keeps
//! that document exactly as received ([`LinePayload`]) and reads it through typed
//! per-category views ([`LineDetails`]). Fields a view does not know about land
//! in its `extension` map instead of being dropped.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::category::LineCategory;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinePayload(Value);

impl LinePayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|object| object.get(key))
    }

    /// Non-blank text for `key`; numbers are rendered as written.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_text)
    }

    /// A manual buffer is declared by the presence of a non-null `buff_pct`.
    pub fn has_buff(&self) -> bool {
        self.get("buff_pct").is_some_and(|value| !value.is_null())
    }

    pub fn buff_pct(&self) -> Option<Decimal> {
        self.get("buff_pct").and_then(value_to_decimal)
    }

    pub fn internal_note(&self) -> Option<String> {
        self.text("internal_note").or_else(|| self.text("internalNote"))
    }

    pub fn provider_url(&self) -> Option<String> {
        let nested = |path: &[&str]| {
            let mut current = &self.0;
            for key in path {
                current = current.as_object()?.get(*key)?;
            }
            value_to_text(current)
        };

        nested(&["fields", "provider_service_url"])
            .or_else(|| nested(&["snapshot", "fields", "provider_service_url"]))
            .or_else(|| self.text("provider_service_url"))
    }

    pub fn details(&self, category: &LineCategory) -> LineDetails {
        match category {
            LineCategory::Flight | LineCategory::Train | LineCategory::Ferry => {
                LineDetails::Transport(self.view())
            }
            LineCategory::Hotel | LineCategory::NewHotel => LineDetails::Hotel(self.view()),
            LineCategory::Activity | LineCategory::NewService => LineDetails::Activity(self.view()),
            LineCategory::CarRental => LineDetails::CarRental(self.view()),
            LineCategory::TripInfo | LineCategory::Internal | LineCategory::Cost => {
                LineDetails::Note(self.view())
            }
            LineCategory::PrivateTransfer
            | LineCategory::Other(_)
            | LineCategory::Uncategorized => LineDetails::Generic(self.view()),
        }
    }

    fn view<T>(&self) -> T
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        if !self.0.is_object() {
            return T::default();
        }
        serde_json::from_value(self.0.clone()).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LineDetails {
    Transport(TransportDetails),
    Hotel(HotelDetails),
    Activity(ActivityDetails),
    CarRental(CarRentalDetails),
    Note(NoteDetails),
    Generic(GenericDetails),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TransportDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub airline: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub class_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dep_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub arr_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub seat_res: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub seat_res_choice: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

impl TransportDetails {
    pub fn has_schedule(&self) -> bool {
        self.dep_time.is_some() || self.arr_time.is_some()
    }

    pub fn body(&self) -> Option<&str> {
        self.note.as_deref().or(self.description.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct HotelDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub room_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hotel_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub breakfast: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub early_check_in: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub early_checkin: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub stars: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hotel_stars: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hotel_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

impl HotelDetails {
    pub fn early_check_in(&self) -> bool {
        self.early_check_in.or(self.early_checkin).unwrap_or(false)
    }

    pub fn breakfast(&self) -> bool {
        self.breakfast.unwrap_or(false)
    }

    /// Star rating clamped to 1..=5. `NA` and non-numeric ratings yield `None`;
    /// a leading number is enough (`"4*"`, `"4 stars"`).
    pub fn star_count(&self) -> Option<u8> {
        let raw = self.stars.as_deref().or(self.hotel_stars.as_deref())?;
        let digits: String = raw.trim().chars().take_while(|ch| ch.is_ascii_digit()).collect();
        let count = digits.parse::<u32>().ok()?;
        if count == 0 {
            return None;
        }
        Some(count.min(5) as u8)
    }

    pub fn body(&self) -> Option<&str> {
        self.description.as_deref().or(self.full_description.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ActivityDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

impl ActivityDetails {
    pub fn body(&self) -> Option<&str> {
        self.description.as_deref().or(self.full_description.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CarRentalDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub pickup_loc: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub pickup_airport: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub vehicle_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub transmission: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub mileage: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub insurance: Option<String>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub one_way_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub intl_driver_license: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NoteDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

impl NoteDetails {
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().or(self.description.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GenericDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_description: Option<String>,
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

impl GenericDetails {
    pub fn body(&self) -> Option<&str> {
        self.description.as_deref().or(self.full_description.as_deref())
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .ok(),
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    }
}

/// Field decoders that never reject a payload: a value of an unexpected shape
/// reads as absent.
mod lenient {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::value_to_text))
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(flag)) => Some(flag),
            Some(Value::Number(number)) => number.as_i64().map(|n| n != 0),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::value_to_decimal))
    }
}
