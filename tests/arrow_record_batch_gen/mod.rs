use arrow::array::RecordBatch;
use arrow::{
    array::{Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use std::sync::Arc;

// Helper functions to create the order datasets used across the tests

pub(crate) fn orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("ID", DataType::Int64, false),
        Field::new("STATUS", DataType::Utf8, true),
        Field::new("AMOUNT", DataType::Float64, true),
    ]))
}

pub(crate) fn orders_record_batch(
    ids: Vec<i64>,
    statuses: Vec<Option<&str>>,
    amounts: Vec<Option<f64>>,
) -> RecordBatch {
    RecordBatch::try_new(
        orders_schema(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(statuses)),
            Arc::new(Float64Array::from(amounts)),
        ],
    )
    .expect("Failed to create orders record batch")
}

// Two batches, five orders, with a null in each nullable column
pub(crate) fn get_orders_record_batches() -> Vec<RecordBatch> {
    vec![
        orders_record_batch(
            vec![1, 2, 3],
            vec![Some("open"), Some("shipped"), None],
            vec![Some(10.5), None, Some(7.25)],
        ),
        orders_record_batch(
            vec![4, 5],
            vec![Some("say \"hi\"; bye"), Some("C:\\orders")],
            vec![Some(-1.25), Some(3.5)],
        ),
    ]
}
