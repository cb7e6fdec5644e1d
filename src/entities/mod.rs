pub mod kv_entry;
