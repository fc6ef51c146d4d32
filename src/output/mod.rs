pub mod csv_writer;
pub mod export;

pub use csv_writer::{append_record, init_csv};
pub use export::{append_jsonl, export_to_json, read_jsonl};
