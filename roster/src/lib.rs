pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod filter;
pub mod notify;
pub mod options;
pub mod persistence;
pub mod rest;
pub mod row;
pub mod selection;

pub use config::{parse_config, parse_config_str, RosterConfig, ViewConfig};
pub use controller::{DeleteOutcome, ListViewController, ViewSnapshot, SEARCH_FILTER};
pub use engine::{PageSize, SortDirection};
pub use error::{Result, RosterError};
pub use filter::{FilterDef, FilterValue};
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier, RecordingNotifier};
pub use options::{CascadeChain, OptionItem, OptionTree};
pub use persistence::{FilterParams, MemoryBackend, Persistence};
pub use rest::RestClient;
pub use row::{FieldValue, Row};
pub use selection::SelectionSet;
