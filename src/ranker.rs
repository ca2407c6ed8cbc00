use crate::parser::LogEntry;
use serde::Serialize;
use std::collections::HashMap;

/// How many IPs are ranked unless the caller asks otherwise
pub const DEFAULT_TOP_N: usize = 5;

/// One row of the IP ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedIp {
    pub ip: String,
    pub count: usize,
    pub percentage: f64,
}

/// Count requests per IP.
pub fn count_requests(entries: &[LogEntry]) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.ip.as_str()).or_insert(0) += 1;
    }
    counts
}

/// The `top_n` IPs with the most requests, busiest first.
///
/// Equal counts keep the order in which the IPs first appear in `entries`.
pub fn top_ips(entries: &[LogEntry], top_n: usize) -> Vec<RankedIp> {
    let total = entries.len();

    // first-occurrence order is tracked explicitly; HashMap iteration is not stable
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        let ip = entry.ip.as_str();
        *counts.entry(ip).or_insert_with(|| {
            order.push(ip);
            0
        }) += 1;
    }

    order.sort_by(|a, b| counts[b].cmp(&counts[a]));

    order
        .into_iter()
        .take(top_n)
        .map(|ip| {
            let count = counts[ip];
            RankedIp {
                ip: ip.to_string(),
                count,
                percentage: (count as f64 / total as f64) * 100.0,
            }
        })
        .collect()
}
