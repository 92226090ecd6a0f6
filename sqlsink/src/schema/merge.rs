use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::{ColumnType, MAX_NUMERIC_PRECISION, MAX_NVARCHAR_LENGTH};

/// Merges column types into a single type able to hold every value of each input.
///
/// The types are reduced pairwise from left to right. Fails with [`ErrorKind::IncompatibleTypes`]
/// when the list is empty or when two types belong to categories that cannot be widened into
/// each other.
pub fn merge_types(types: &[ColumnType]) -> SinkResult<ColumnType> {
    let Some((first, rest)) = types.split_first() else {
        bail!(ErrorKind::IncompatibleTypes, "No column types to merge");
    };

    let mut merged = first.clone();
    for column_type in rest {
        merged = merge_pair(&merged, column_type)?;
    }

    Ok(merged)
}

/// Merges two column types, widening only.
///
/// `current` wins whenever both types render identically.
pub fn merge_pair(current: &ColumnType, incoming: &ColumnType) -> SinkResult<ColumnType> {
    if current.sql() == incoming.sql() {
        return Ok(current.clone());
    }

    if let (Some(current_rank), Some(incoming_rank)) =
        (current.textual_rank(), incoming.textual_rank())
    {
        if current.is_national() || incoming.is_national() {
            return Ok(merge_national(current, incoming));
        }

        return Ok(if incoming_rank > current_rank {
            incoming.clone()
        } else {
            current.clone()
        });
    }

    if let (Some(current_width), Some(incoming_width)) =
        (current.integer_width(), incoming.integer_width())
    {
        return Ok(if incoming_width > current_width {
            incoming.clone()
        } else {
            current.clone()
        });
    }

    if let (
        ColumnType::Numeric {
            precision: current_precision,
            scale: current_scale,
        },
        ColumnType::Numeric {
            precision: incoming_precision,
            scale: incoming_scale,
        },
    ) = (current, incoming)
    {
        let scale = *current_scale.max(incoming_scale);
        let integer_digits = current_precision
            .saturating_sub(*current_scale)
            .max(incoming_precision.saturating_sub(*incoming_scale));
        let precision = integer_digits
            .saturating_add(scale)
            .min(MAX_NUMERIC_PRECISION);

        return Ok(ColumnType::Numeric { precision, scale });
    }

    bail!(
        ErrorKind::IncompatibleTypes,
        "Column types cannot be merged",
        format!("cannot merge `{current}` with `{incoming}`")
    );
}

/// Merges two textual types of which at least one is Unicode. The result stays Unicode.
fn merge_national(current: &ColumnType, incoming: &ColumnType) -> ColumnType {
    let length = character_length(current)
        .zip(character_length(incoming))
        .map(|(current, incoming)| current.max(incoming))
        .filter(|length| *length <= MAX_NVARCHAR_LENGTH);

    ColumnType::NVarchar(length)
}

/// Bounded length of a textual type in characters, `None` when unbounded.
fn character_length(column_type: &ColumnType) -> Option<u32> {
    match column_type {
        ColumnType::Boolean => Some(1),
        ColumnType::Varchar(length) | ColumnType::NVarchar(length) => *length,
        _ => None,
    }
}
