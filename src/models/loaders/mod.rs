pub mod csv_loader;

pub use csv_loader::{load_records_from_csv, parse_records};
