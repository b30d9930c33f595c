//! Default values for configuration fields.

use super::sender::IntervalPolicy;

pub fn default_true() -> bool {
    true
}

pub fn default_data_dir() -> String {
    "~/.disparo".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_db_path() -> String {
    "~/.disparo/data/disparo.db".to_string()
}

pub fn default_gateway_base_url() -> String {
    "http://localhost:3000".to_string()
}

pub fn default_gateway_session() -> String {
    "default".to_string()
}

pub fn default_gateway_timeout() -> u64 {
    30
}

pub fn default_interval() -> IntervalPolicy {
    IntervalPolicy::Fixed { seconds: 60 }
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_retry_base_ms() -> u64 {
    1500
}

pub fn default_country_code() -> String {
    "55".to_string()
}
