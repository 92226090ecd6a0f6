mod merge_properties_test;
mod schema_evolution_test;
mod stream_protocol_test;
mod upsert_test;
