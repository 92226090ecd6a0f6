use sqlsink::conversions::name::{IdentifierKind, conform_name, schema_name_for_stream};
use sqlsink::error::ErrorKind;
use sqlsink::schema::{TypeMapper, merge_types};
use sqlsink::types::{ColumnType, JsonType, PropertySchema};

fn textual_types() -> Vec<ColumnType> {
    let mut types: Vec<ColumnType> = [2, 10, 50, 255, 4000, 8000]
        .into_iter()
        .map(|length| ColumnType::Varchar(Some(length)))
        .collect();
    types.push(ColumnType::Boolean);
    types.push(ColumnType::Varchar(None));
    types.push(ColumnType::Text);
    types
}

#[test]
fn textual_merge_never_picks_the_shorter_type() {
    for a in textual_types() {
        for b in textual_types() {
            let merged = merge_types(&[a.clone(), b.clone()]).unwrap();
            let rank = merged.textual_rank().unwrap();

            assert!(rank >= a.textual_rank().unwrap(), "{a} + {b} -> {merged}");
            assert!(rank >= b.textual_rank().unwrap(), "{a} + {b} -> {merged}");
            assert_eq!(merged, merge_types(&[b.clone(), a.clone()]).unwrap());
        }
    }
}

#[test]
fn single_type_merge_is_identity() {
    let mut types = textual_types();
    types.extend([
        ColumnType::BigInt,
        ColumnType::DEFAULT_NUMERIC,
        ColumnType::Float,
        ColumnType::Date,
        ColumnType::Time,
        ColumnType::DateTime,
        ColumnType::Json,
        ColumnType::Other("uniqueidentifier".to_string()),
    ]);

    for column_type in types {
        assert_eq!(merge_types(&[column_type.clone()]).unwrap(), column_type);
    }
}

#[test]
fn cross_category_merge_fails() {
    let err = merge_types(&[ColumnType::Varchar(Some(10)), ColumnType::DateTime]).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IncompatibleTypes);
}

#[test]
fn max_length_maps_to_exact_varchar() {
    let mapper = TypeMapper::default();

    for max_length in [1, 7, 50, 255, 1000, 7999, 8000] {
        let descriptor = PropertySchema::of(JsonType::String).with_max_length(max_length);

        assert_eq!(
            mapper.map_type(&descriptor),
            ColumnType::Varchar(Some(max_length as u32))
        );
    }
    assert_eq!(
        mapper.map_type(&PropertySchema::of(JsonType::String).with_max_length(8001)),
        ColumnType::Text
    );
}

#[test]
fn conformer_scenarios() {
    assert_eq!(
        conform_name("CamelCase", IdentifierKind::Column).unwrap(),
        "camel_case"
    );
    assert_eq!(
        conform_name("2ndTable", IdentifierKind::Table).unwrap(),
        "_2nd_table"
    );
    assert_eq!(
        schema_name_for_stream("public-users", None).unwrap(),
        Some("dbo".to_string())
    );
}
