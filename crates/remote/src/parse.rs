//! Parsers for remote command output

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

static POWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)node(?P<index>[0-9]):\s*(?P<status>.*)").expect("power line pattern is valid")
});

/// Parse a milli-degree Celsius reading such as `45000`
pub fn parse_temperature(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|millis| millis / 1000.0)
}

/// First routable IPv4 address in a list of one-address-per-line output
///
/// Loopback (`127.`) and link-local (`169.`) addresses are skipped. Older
/// `ifconfig` builds print `addr:` in front of the address.
pub fn parse_primary_address(text: &str) -> Option<Ipv4Addr> {
    text.lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("addr:").unwrap_or(line))
        .filter(|line| !line.starts_with("127.") && !line.starts_with("169."))
        .find_map(|line| line.parse::<Ipv4Addr>().ok())
}

/// Parse the carrier's per-node power table
///
/// Lines look like `node1: On`. The table has one slot per non-empty line;
/// slot `n - 1` holds whether node `n` is powered.
pub fn parse_power_table(text: &str) -> Vec<bool> {
    let lines = text.lines().filter(|line| !line.trim().is_empty());
    let mut table = vec![false; lines.clone().count()];

    for captures in lines.filter_map(|line| POWER_LINE.captures(line)) {
        let Some(index) = captures["index"]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
        else {
            continue;
        };
        if let Some(slot) = table.get_mut(index) {
            *slot = captures["status"].trim().eq_ignore_ascii_case("on");
        }
    }

    table
}

/// Parse the one-word power state of a single node (`On` / `Off`)
pub fn parse_power_state(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("on")
}
