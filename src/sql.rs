pub mod arrow_sql_gen;
pub mod bulk_load;
pub mod db_connection_pool;
