//! Versioned request/response payload types.
//!
//! The JSON encoding uses camelCase field names and renders each oneof as an
//! externally-tagged object (`{"visualization": {"grid": {...}}}`,
//! `{"data": {"ints": {"values": [...]}}}`, `{"output": {"optionList":
//! {...}}}`), so payloads round-trip byte-faithfully. An unset oneof
//! deserializes to `None`; the validator treats that as an error, never as a
//! default.

use serde::{Deserialize, Serialize};

/// A collection request: one or more inputs plus the schema the operator's
/// answer must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputKind>,
}

/// A single input: how to visualize it, and the raw data block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataBlock>,
}

/// How an input should be rendered for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visualization {
    Grid(Grid),
    MultiGrid(MultiChannelGrid),
    Scalar(Scalar),
    Vector(Vector2D),
    TimeSeries(TimeSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiChannelGrid {
    pub rows: i32,
    pub cols: i32,
    pub channels: i32,
    #[serde(default)]
    pub channel_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vector2D {
    pub label: String,
    pub max_magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub label: String,
    pub points: i32,
    pub min_value: f64,
    pub max_value: f64,
}

/// The raw values backing an input, integer or floating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataBlock {
    Ints { values: Vec<i64> },
    Floats { values: Vec<f64> },
}

/// The schema the operator's answer must match. Currently a single variant:
/// a list of labeled options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    OptionList(OptionListSchema),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionListSchema {
    #[serde(default)]
    pub options: Vec<OptionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub label: String,
    pub hotkey: String,
}

/// The operator's answer, delivered back to the suspended caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputValue {
    OptionList(OptionListOutput),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionListOutput {
    pub index: i32,
}
