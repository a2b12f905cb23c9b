use crate::protocol::{SensorType, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sketch_name: String,
    #[serde(default)]
    pub sketch_version: String,
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub parent_id: Option<u8>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    #[serde(default)]
    pub sensors: BTreeMap<u8, Sensor>,
}

impl Node {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            name: None,
            sketch_name: String::new(),
            sketch_version: String::new(),
            protocol_version: String::new(),
            battery_level: None,
            parent_id: None,
            last_seen: None,
            sensors: BTreeMap::new(),
        }
    }

    /// Explicit name if one was set, otherwise the sketch name.
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(n) if !n.is_empty() => n,
            _ => &self.sketch_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: u8,
    pub sensor_type: SensorType,
    #[serde(default)]
    pub description: String,
    /// Latest value per variable type, sorted by type.
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Sensor {
    pub fn new(id: u8, sensor_type: SensorType) -> Self {
        Self {
            id,
            sensor_type,
            description: String::new(),
            readings: Vec::new(),
        }
    }

    pub fn reading(&self, value_type: ValueType) -> Option<&Reading> {
        self.readings.iter().find(|r| r.value_type == value_type)
    }

    /// Most recently updated reading of any type.
    pub fn last_value(&self) -> Option<&Reading> {
        self.readings.iter().max_by_key(|r| r.updated)
    }

    pub(crate) fn record(&mut self, value_type: ValueType, value: &str, at: OffsetDateTime) {
        match self
            .readings
            .binary_search_by_key(&value_type, |r| r.value_type)
        {
            Ok(i) => {
                let r = &mut self.readings[i];
                r.value = value.to_string();
                r.updated = at;
            }
            Err(i) => self.readings.insert(
                i,
                Reading {
                    value_type,
                    value: value.to_string(),
                    updated: at,
                },
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value_type: ValueType,
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
}
