pub const NO_START_SERVER_ENV: &str = "JACKNATIVE_NO_START_SERVER";
pub const LOG_ENV: &str = "JACKNATIVE_LOG";

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    let s = value.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}
