pub mod config;
pub mod csv;
pub mod datatypes;
pub mod error;
pub mod parse;
pub mod record;

pub use config::{Config, Headers, RowSep};
pub use csv::{Reader, Record, Writer};
pub use datatypes::{Field, FieldInfo};
pub use error::{Error, Malformation};
pub use parse::{Builtin, Converter, ConverterSpec, HeaderBuiltin, Pipeline, Registries, Registry};
pub use record::{Item, Key, Pair, Row};
