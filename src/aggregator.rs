use crate::models::{
    ChurnRecord, ClassificationSummary, ClientRecord, ContactRevenue, DashboardResponse,
    DayRevenue, Kpis, Movement, Snapshot, StatsBlob, StatusShare, TopClient,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const WINDOW_CHOICES: [i64; 5] = [7, 15, 30, 60, 90];
pub const TOP_CLIENTS_LIMIT: usize = 30;
pub const TOP_CONTACTS_LIMIT: usize = 10;

pub const UNCLASSIFIED: &str = "unclassified";
pub const NO_CONTACT: &str = "(no contact)";

const ACTIVE_PREFIX: &str = "1.";
const LOST_PREFIX: &str = "2.";
const NEW_PREFIX: &str = "4.";

static CLASSIFICATION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)").expect("classification code pattern"));

pub fn effective_window_days(raw: i64) -> i64 {
    if raw > 0 { raw } else { DEFAULT_WINDOW_DAYS }
}

/// Window length from a raw query value; anything but a positive integer is the default.
pub fn parse_window_days(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map(effective_window_days)
        .unwrap_or(DEFAULT_WINDOW_DAYS)
}

pub fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Start of the trailing window. A window too large to represent has no cutoff.
pub fn window_cutoff(now: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    Duration::try_days(effective_window_days(window_days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn build_dashboard(snapshot: &Snapshot, window_days: i64) -> DashboardResponse {
    build_dashboard_at(Utc::now(), snapshot, window_days)
}

pub fn build_dashboard_at(
    now: DateTime<Utc>,
    snapshot: &Snapshot,
    window_days: i64,
) -> DashboardResponse {
    let window_days = effective_window_days(window_days);

    DashboardResponse {
        window_days,
        kpis: compute_kpis(
            now,
            &snapshot.movements,
            &snapshot.churn,
            &snapshot.stats,
            window_days,
        ),
        top_clients: top_clients_by_revenue(now, &snapshot.churn, window_days, TOP_CLIENTS_LIMIT),
        revenue_by_day: revenue_by_day(now, &snapshot.movements, window_days),
        revenue_by_contact: revenue_by_contact(&snapshot.movements, TOP_CONTACTS_LIMIT),
        status_breakdown: status_breakdown(&snapshot.clients),
        classification_breakdown: classification_breakdown(&snapshot.churn),
        status_counts: client_status_counts(&snapshot.clients),
        classification_counts: classification_counts(&snapshot.churn),
    }
}

pub fn compute_kpis(
    now: DateTime<Utc>,
    movements: &[Movement],
    churn: &[ChurnRecord],
    stats: &StatsBlob,
    window_days: i64,
) -> Kpis {
    let windowed = windowed_churn(now, churn, window_days);

    let windowed_revenue: f64 = windowed.iter().map(|record| record.total_billing).sum();
    let windowed_order_count = windowed
        .iter()
        .fold(0u64, |acc, record| acc.saturating_add(record.order_count));
    let avg_ticket = if windowed_order_count > 0 {
        windowed_revenue / windowed_order_count as f64
    } else {
        0.0
    };

    Kpis {
        total_clients: windowed.len() as u64,
        active_clients: count_with_prefix(&windowed, ACTIVE_PREFIX),
        lost_clients: count_with_prefix(&windowed, LOST_PREFIX),
        no_contact_30d: stats.contacts_with_no_recent_contact_30d,
        total_revenue: movements
            .iter()
            .filter(|movement| movement.is_sale())
            .map(|movement| movement.amount)
            .sum(),
        windowed_revenue,
        windowed_order_count,
        avg_ticket,
        all_time_churn_revenue: churn.iter().map(|record| record.total_billing).sum(),
        new_clients_count: churn
            .iter()
            .filter(|record| record.has_prefix(NEW_PREFIX))
            .count() as u64,
    }
}

pub fn top_clients_by_revenue(
    now: DateTime<Utc>,
    churn: &[ChurnRecord],
    window_days: i64,
    limit: usize,
) -> Vec<TopClient> {
    let mut clients: Vec<TopClient> = windowed_churn(now, churn, window_days)
        .into_iter()
        .map(|record| TopClient {
            name: display_name(record.contact_name.as_deref()),
            revenue: record.total_billing,
        })
        .collect();

    // sort_by is stable: equal revenues keep input order
    clients.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    clients.truncate(limit);
    clients
}

/// Tally records by key. Missing or blank keys land in the `unclassified` bucket.
pub fn group_counts<T, F>(records: &[T], key_fn: F) -> BTreeMap<String, u64>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        let key = bucket_key(key_fn(record));
        let entry = counts.entry(key).or_insert(0u64);
        *entry = entry.saturating_add(1);
    }
    counts
}

pub fn client_status_counts(clients: &[ClientRecord]) -> BTreeMap<String, u64> {
    group_counts(clients, |client| client.status.as_deref())
}

pub fn classification_counts(churn: &[ChurnRecord]) -> BTreeMap<String, u64> {
    group_counts(churn, |record| Some(record.classification.as_str()))
}

/// Daily sale totals inside the window. Days without sales are omitted.
pub fn revenue_by_day(
    now: DateTime<Utc>,
    movements: &[Movement],
    window_days: i64,
) -> Vec<DayRevenue> {
    let cutoff = window_cutoff(now, window_days);
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for movement in movements.iter().filter(|movement| movement.is_sale()) {
        let Some(date) = movement.date else {
            continue;
        };
        if date.with_timezone(&Utc) < cutoff {
            continue;
        }
        let day = date.with_timezone(&Utc).date_naive();
        *totals.entry(day).or_insert(0.0) += movement.amount;
    }

    totals
        .into_iter()
        .map(|(date, total)| DayRevenue {
            date: date_key(date),
            total,
        })
        .collect()
}

pub fn revenue_by_contact(movements: &[Movement], limit: usize) -> Vec<ContactRevenue> {
    let mut order: Vec<ContactRevenue> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for movement in movements.iter().filter(|movement| movement.is_sale()) {
        let name = movement.contact_name.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() {
            continue;
        }

        match index.get(name) {
            Some(&position) => order[position].total += movement.amount,
            None => {
                index.insert(name.to_string(), order.len());
                order.push(ContactRevenue {
                    name: name.to_string(),
                    total: movement.amount,
                });
            }
        }
    }

    order.sort_by(|a, b| b.total.total_cmp(&a.total));
    order.truncate(limit);
    order
}

pub fn status_breakdown(clients: &[ClientRecord]) -> Vec<StatusShare> {
    let total = clients.len();
    let mut shares: Vec<StatusShare> = client_status_counts(clients)
        .into_iter()
        .map(|(status, count)| StatusShare {
            percent: if total > 0 {
                count as f64 * 100.0 / total as f64
            } else {
                0.0
            },
            status,
            count,
        })
        .collect();

    // keys arrive sorted from the BTreeMap, so ties stay alphabetical
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

pub fn classification_breakdown(churn: &[ChurnRecord]) -> Vec<ClassificationSummary> {
    let mut buckets: BTreeMap<String, (u64, f64)> = BTreeMap::new();
    for record in churn {
        let entry = buckets
            .entry(bucket_key(Some(&record.classification)))
            .or_insert((0, 0.0));
        entry.0 = entry.0.saturating_add(1);
        entry.1 += record.total_billing;
    }

    let mut rows: Vec<ClassificationSummary> = buckets
        .into_iter()
        .map(|(classification, (count, total_billing))| ClassificationSummary {
            avg_billing: if count > 0 { total_billing / count as f64 } else { 0.0 },
            classification,
            count,
            total_billing,
        })
        .collect();

    rows.sort_by(|a, b| {
        classification_sort_key(&a.classification)
            .total_cmp(&classification_sort_key(&b.classification))
    });
    rows
}

/// First `N.N` code inside a classification label, or 999 so unlabelled buckets sort last.
pub fn classification_sort_key(label: &str) -> f64 {
    CLASSIFICATION_CODE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
        .unwrap_or(999.0)
}

fn windowed_churn(
    now: DateTime<Utc>,
    churn: &[ChurnRecord],
    window_days: i64,
) -> Vec<&ChurnRecord> {
    let cutoff = window_cutoff(now, window_days);
    churn
        .iter()
        .filter(|record| {
            record
                .last_order_date
                .is_some_and(|date| date.with_timezone(&Utc) >= cutoff)
        })
        .collect()
}

fn count_with_prefix(records: &[&ChurnRecord], prefix: &str) -> u64 {
    records.iter().filter(|record| record.has_prefix(prefix)).count() as u64
}

fn bucket_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => UNCLASSIFIED.to_string(),
    }
}

fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => NO_CONTACT.to_string(),
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
