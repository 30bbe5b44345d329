//! Request validation: schema and bounds checks over the wire payload.
//!
//! [`validate`] is pure and returns the first failure with a path-qualified
//! message. Unset oneof variants are errors, never silent defaults.

use collector_types::proto::{
    DataBlock, Grid, Input, MultiChannelGrid, OutputKind, Request, Scalar, TimeSeries, Vector2D,
    Visualization,
};

const MAX_GRID_SIDE: i32 = 100;
const MAX_CHANNELS: i32 = 10;
const MAX_TIME_SERIES_POINTS: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn fail(msg: impl Into<String>) -> Result<(), ValidationError> {
    Err(ValidationError(msg.into()))
}

/// Validates a request against the schema and bounds contract.
pub fn validate(req: &Request) -> Result<(), ValidationError> {
    if req.inputs.is_empty() {
        return fail("request must have at least one input");
    }

    for (i, input) in req.inputs.iter().enumerate() {
        validate_input(input).map_err(|e| ValidationError(format!("input {i}: {e}")))?;
    }

    match &req.output {
        None => fail("output schema is required"),
        Some(kind) => {
            validate_output_schema(kind).map_err(|e| ValidationError(format!("output schema: {e}")))
        }
    }
}

fn validate_input(input: &Input) -> Result<(), ValidationError> {
    match &input.visualization {
        Some(Visualization::Grid(grid)) => validate_grid(grid, input.data.as_ref())?,
        Some(Visualization::MultiGrid(grid)) => validate_multi_grid(grid, input.data.as_ref())?,
        Some(Visualization::Scalar(scalar)) => validate_scalar(scalar, input.data.as_ref())?,
        Some(Visualization::Vector(vector)) => validate_vector(vector, input.data.as_ref())?,
        Some(Visualization::TimeSeries(series)) => {
            validate_time_series(series, input.data.as_ref())?
        }
        None => return fail("visualization is required"),
    }

    validate_data_block(input.data.as_ref())
}

fn validate_grid(grid: &Grid, data: Option<&DataBlock>) -> Result<(), ValidationError> {
    if grid.rows <= 0 || grid.cols <= 0 {
        return fail(format!(
            "grid dimensions must be positive (got {}x{})",
            grid.rows, grid.cols
        ));
    }
    if grid.rows > MAX_GRID_SIDE || grid.cols > MAX_GRID_SIDE {
        return fail(format!(
            "grid too large (max 100x100, got {}x{})",
            grid.rows, grid.cols
        ));
    }

    let expected = grid.rows as usize * grid.cols as usize;
    match data {
        None => fail("data is required"),
        Some(DataBlock::Ints { values }) if values.len() != expected => fail(format!(
            "data size {} doesn't match grid size {expected}",
            values.len()
        )),
        Some(DataBlock::Floats { values }) if values.len() != expected => fail(format!(
            "data size {} doesn't match grid size {expected}",
            values.len()
        )),
        Some(_) => Ok(()),
    }
}

fn validate_multi_grid(
    grid: &MultiChannelGrid,
    data: Option<&DataBlock>,
) -> Result<(), ValidationError> {
    if grid.rows <= 0 || grid.cols <= 0 {
        return fail(format!(
            "grid dimensions must be positive (got {}x{})",
            grid.rows, grid.cols
        ));
    }
    if grid.rows > MAX_GRID_SIDE || grid.cols > MAX_GRID_SIDE {
        return fail(format!(
            "grid too large (max 100x100, got {}x{})",
            grid.rows, grid.cols
        ));
    }
    if grid.channels <= 0 {
        return fail(format!(
            "channel count must be positive (got {})",
            grid.channels
        ));
    }
    if grid.channels > MAX_CHANNELS {
        return fail(format!(
            "too many channels (max 10, got {})",
            grid.channels
        ));
    }
    if !grid.channel_names.is_empty() && grid.channel_names.len() != grid.channels as usize {
        return fail(format!(
            "channel names count {} doesn't match channel count {}",
            grid.channel_names.len(),
            grid.channels
        ));
    }

    let expected = grid.rows as usize * grid.cols as usize * grid.channels as usize;
    let got = match data {
        None => return fail("data is required"),
        Some(DataBlock::Ints { values }) => values.len(),
        Some(DataBlock::Floats { values }) => values.len(),
    };
    if got != expected {
        return fail(format!(
            "data size {got} doesn't match expected size {expected} (rows*cols*channels={}*{}*{})",
            grid.rows, grid.cols, grid.channels
        ));
    }
    Ok(())
}

fn validate_scalar(scalar: &Scalar, data: Option<&DataBlock>) -> Result<(), ValidationError> {
    if scalar.label.is_empty() {
        return fail("scalar label is required");
    }
    if scalar.min >= scalar.max {
        return fail(format!(
            "scalar min {} must be less than max {}",
            scalar.min, scalar.max
        ));
    }

    match data {
        None => fail("data is required"),
        Some(DataBlock::Floats { values }) => {
            if values.len() != 1 {
                return fail(format!(
                    "scalar requires exactly 1 float value (got {})",
                    values.len()
                ));
            }
            let value = values[0];
            if value < scalar.min || value > scalar.max {
                return fail(format!(
                    "scalar value {value} is outside range [{}, {}]",
                    scalar.min, scalar.max
                ));
            }
            Ok(())
        }
        Some(DataBlock::Ints { .. }) => fail("scalar visualization requires float data"),
    }
}

fn validate_vector(vector: &Vector2D, data: Option<&DataBlock>) -> Result<(), ValidationError> {
    if vector.label.is_empty() {
        return fail("vector label is required");
    }
    if vector.max_magnitude <= 0.0 {
        return fail(format!(
            "vector max_magnitude must be positive (got {})",
            vector.max_magnitude
        ));
    }

    match data {
        None => fail("data is required"),
        Some(DataBlock::Floats { values }) => {
            if values.len() != 2 {
                return fail(format!(
                    "vector requires exactly 2 float values (got {})",
                    values.len()
                ));
            }
            let magnitude = (values[0] * values[0] + values[1] * values[1]).sqrt();
            if magnitude > vector.max_magnitude {
                return fail(format!(
                    "vector magnitude {magnitude} exceeds max_magnitude {}",
                    vector.max_magnitude
                ));
            }
            Ok(())
        }
        Some(DataBlock::Ints { .. }) => fail("vector visualization requires float data"),
    }
}

fn validate_time_series(
    series: &TimeSeries,
    data: Option<&DataBlock>,
) -> Result<(), ValidationError> {
    if series.label.is_empty() {
        return fail("time series label is required");
    }
    if series.points <= 0 {
        return fail(format!(
            "time series points must be positive (got {})",
            series.points
        ));
    }
    if series.points > MAX_TIME_SERIES_POINTS {
        return fail(format!(
            "time series has too many points (max 1000, got {})",
            series.points
        ));
    }
    if series.min_value >= series.max_value {
        return fail(format!(
            "time series min_value {} must be less than max_value {}",
            series.min_value, series.max_value
        ));
    }

    match data {
        None => fail("data is required"),
        Some(DataBlock::Floats { values }) => {
            if values.len() != series.points as usize {
                return fail(format!(
                    "data size {} doesn't match expected points {}",
                    values.len(),
                    series.points
                ));
            }
            for (i, value) in values.iter().enumerate() {
                if *value < series.min_value || *value > series.max_value {
                    return fail(format!(
                        "time series value at index {i} ({value}) is outside range [{}, {}]",
                        series.min_value, series.max_value
                    ));
                }
            }
            Ok(())
        }
        Some(DataBlock::Ints { .. }) => fail("time series visualization requires float data"),
    }
}

/// All float values must be finite, regardless of the visualization variant.
fn validate_data_block(data: Option<&DataBlock>) -> Result<(), ValidationError> {
    match data {
        None => fail("data is required"),
        Some(DataBlock::Ints { .. }) => Ok(()),
        Some(DataBlock::Floats { values }) => {
            for (i, value) in values.iter().enumerate() {
                if value.is_nan() {
                    return fail(format!("float value at index {i} is NaN"));
                }
                if value.is_infinite() {
                    return fail(format!("float value at index {i} is infinite"));
                }
            }
            Ok(())
        }
    }
}

fn validate_output_schema(kind: &OutputKind) -> Result<(), ValidationError> {
    match kind {
        OutputKind::OptionList(list) => {
            if list.options.len() < 2 {
                return fail(format!(
                    "option list must have at least 2 options (got {})",
                    list.options.len()
                ));
            }

            let mut hotkeys = std::collections::HashSet::new();
            for (i, option) in list.options.iter().enumerate() {
                if option.label.is_empty() {
                    return fail(format!("option {i} label cannot be empty"));
                }
                if option.hotkey.chars().count() != 1 {
                    return fail(format!(
                        "option {i} hotkey must be single character (got \"{}\")",
                        option.hotkey
                    ));
                }
                if !hotkeys.insert(option.hotkey.as_str()) {
                    return fail(format!(
                        "duplicate hotkey \"{}\" found at option {i}",
                        option.hotkey
                    ));
                }
            }
            Ok(())
        }
    }
}
