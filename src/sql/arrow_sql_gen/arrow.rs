use datafusion::arrow::{
    array::{
        ArrayBuilder, BinaryBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int16Builder,
        Int32Builder, Int64Builder, Int8Builder, LargeStringBuilder, NullBuilder, StringBuilder,
        UInt64Builder,
    },
    datatypes::DataType,
};

/// Returns a builder for the data types produced when reading driver rows, `None` otherwise.
pub fn map_data_type_to_array_builder(data_type: &DataType) -> Option<Box<dyn ArrayBuilder>> {
    let builder: Box<dyn ArrayBuilder> = match data_type {
        DataType::Int8 => Box::new(Int8Builder::new()),
        DataType::Int16 => Box::new(Int16Builder::new()),
        DataType::Int32 => Box::new(Int32Builder::new()),
        DataType::Int64 => Box::new(Int64Builder::new()),
        DataType::UInt64 => Box::new(UInt64Builder::new()),
        DataType::Float32 => Box::new(Float32Builder::new()),
        DataType::Float64 => Box::new(Float64Builder::new()),
        DataType::Utf8 => Box::new(StringBuilder::new()),
        DataType::LargeUtf8 => Box::new(LargeStringBuilder::new()),
        DataType::Boolean => Box::new(BooleanBuilder::new()),
        DataType::Binary => Box::new(BinaryBuilder::new()),
        DataType::Null => Box::new(NullBuilder::new()),
        _ => return None,
    };
    Some(builder)
}
