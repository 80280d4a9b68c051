use crate::aggregator::WINDOW_CHOICES;
use crate::models::DashboardResponse;
use chrono::NaiveDate;
use std::fmt::Write;

/// Shown wherever a value is missing or not a number.
pub const PLACEHOLDER: &str = "-";

const NAME_WIDTH: usize = 20;

/// Fills every `{{NAME}}` slot of the template in one pass, so record text that
/// happens to look like a slot is never expanded.
pub fn render_dashboard(dashboard: &DashboardResponse) -> String {
    let mut out = String::with_capacity(DASHBOARD_HTML.len() + 4096);
    let mut rest = DASHBOARD_HTML;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        match slot(&after[..end], dashboard) {
            Some(filled) => out.push_str(&filled),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn slot(name: &str, dashboard: &DashboardResponse) -> Option<String> {
    let filled = match name {
        "WINDOW" => dashboard.window_days.to_string(),
        "WINDOW_OPTIONS" => window_options(dashboard.window_days),
        "KPI_CARDS" => kpi_cards(dashboard),
        "DAILY_BARS" => daily_bars(dashboard),
        "TOP_CLIENTS" => top_client_rows(dashboard),
        "TOP_CONTACTS" => top_contact_rows(dashboard),
        "STATUS_ROWS" => status_rows(dashboard),
        "CHURN_ROWS" => churn_rows(dashboard),
        _ => return None,
    };
    Some(filled)
}

/// Currency in es-AR style: `$ 1.234,56`.
pub fn format_money(value: Option<f64>) -> String {
    let Some(value) = value.filter(|value| value.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && !is_zero(whole, fraction) { "-" } else { "" };
    format!("{sign}$ {},{fraction}", group_thousands(whole))
}

/// es-AR grouping with up to three decimals, trailing zeros dropped.
pub fn format_number(value: Option<f64>) -> String {
    let Some(value) = value.filter(|value| value.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    let fixed = format!("{:.3}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');
    let sign = if value < 0.0 && !is_zero(whole, fraction) { "-" } else { "" };
    let mut out = format!("{sign}{}", group_thousands(whole));
    if !fraction.is_empty() {
        out.push(',');
        out.push_str(fraction);
    }
    out
}

fn is_zero(whole: &str, fraction: &str) -> bool {
    whole.bytes().chain(fraction.bytes()).all(|digit| digit == b'0')
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn shorten(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let head: String = name.chars().take(NAME_WIDTH).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn day_label(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|day| day.format("%d/%m").to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn window_options(selected: i64) -> String {
    let mut choices = WINDOW_CHOICES.to_vec();
    if !choices.contains(&selected) {
        choices.push(selected);
        choices.sort_unstable();
    }

    let mut out = String::new();
    for days in choices {
        let marker = if days == selected { " selected" } else { "" };
        let _ = writeln!(
            out,
            r#"<option value="{days}"{marker}>Last {days} days</option>"#
        );
    }
    out
}

fn kpi_cards(dashboard: &DashboardResponse) -> String {
    let kpis = &dashboard.kpis;
    let window = dashboard.window_days;
    let avg_ticket = if kpis.avg_ticket > 0.0 {
        format_money(Some(kpis.avg_ticket))
    } else {
        PLACEHOLDER.to_string()
    };

    let cards = [
        ("Clients".to_string(), format_number(Some(kpis.total_clients as f64))),
        (format!("Sales (last {window} days)"), format_money(Some(kpis.windowed_revenue))),
        (format!("Average ticket (last {window} days)"), avg_ticket),
        ("Active".to_string(), format_number(Some(kpis.active_clients as f64))),
        ("Lost / at risk".to_string(), format_number(Some(kpis.lost_clients as f64))),
        ("New".to_string(), format_number(Some(kpis.new_clients_count as f64))),
        ("No contact in 30 days".to_string(), format_number(Some(kpis.no_contact_30d as f64))),
        ("Revenue, all time".to_string(), format_money(Some(kpis.total_revenue))),
        ("Churn billing, all time".to_string(), format_money(Some(kpis.all_time_churn_revenue))),
    ];

    let mut out = String::new();
    for (label, value) in cards {
        let _ = writeln!(
            out,
            r#"<div class="stat"><span class="label">{}</span><span class="value">{}</span></div>"#,
            escape_html(&label),
            escape_html(&value)
        );
    }
    out
}

fn daily_bars(dashboard: &DashboardResponse) -> String {
    if dashboard.revenue_by_day.is_empty() {
        return empty_note("No sales in this period.");
    }

    let max = dashboard
        .revenue_by_day
        .iter()
        .map(|day| day.total)
        .fold(0.0_f64, f64::max);

    let mut out = String::new();
    for day in &dashboard.revenue_by_day {
        let width = if max > 0.0 { day.total / max * 100.0 } else { 0.0 };
        let _ = writeln!(
            out,
            r#"<div class="bar-row"><span class="bar-label">{}</span><span class="bar" style="width: {width:.1}%"></span><span class="bar-value">{}</span></div>"#,
            escape_html(&day_label(&day.date)),
            escape_html(&format_money(Some(day.total)))
        );
    }
    out
}

fn top_client_rows(dashboard: &DashboardResponse) -> String {
    if dashboard.top_clients.is_empty() {
        return empty_row(3);
    }

    let mut out = String::new();
    for (rank, client) in dashboard.top_clients.iter().enumerate() {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>",
            rank + 1,
            escape_html(&client.name),
            escape_html(&format_money(Some(client.revenue)))
        );
    }
    out
}

fn top_contact_rows(dashboard: &DashboardResponse) -> String {
    if dashboard.revenue_by_contact.is_empty() {
        return empty_row(2);
    }

    let mut out = String::new();
    for contact in &dashboard.revenue_by_contact {
        let _ = writeln!(
            out,
            "<tr><td title=\"{}\">{}</td><td class=\"num\">{}</td></tr>",
            escape_html(&contact.name),
            escape_html(&shorten(&contact.name)),
            escape_html(&format_money(Some(contact.total)))
        );
    }
    out
}

fn status_rows(dashboard: &DashboardResponse) -> String {
    if dashboard.status_breakdown.is_empty() {
        return empty_row(3);
    }

    let mut out = String::new();
    for share in &dashboard.status_breakdown {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{:.1}%</td></tr>",
            escape_html(&share.status),
            escape_html(&format_number(Some(share.count as f64))),
            share.percent
        );
    }
    out
}

fn churn_rows(dashboard: &DashboardResponse) -> String {
    if dashboard.classification_breakdown.is_empty() {
        return empty_row(4);
    }

    let mut out = String::new();
    for row in &dashboard.classification_breakdown {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape_html(&row.classification),
            escape_html(&format_number(Some(row.count as f64))),
            escape_html(&format_money(Some(row.total_billing))),
            escape_html(&format_money(Some(row.avg_billing)))
        );
    }
    out
}

fn empty_row(columns: usize) -> String {
    format!("<tr><td colspan=\"{columns}\" class=\"empty\">No data</td></tr>\n")
}

fn empty_note(message: &str) -> String {
    format!("<p class=\"empty\">{}</p>\n", escape_html(message))
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>CRM Dashboard</title>
  <style>
    :root {
      --bg: #f3f4f6;
      --ink: #1f2937;
      --muted: #6b7280;
      --accent: #6b8e23;
      --accent-soft: rgba(107, 142, 35, 0.15);
      --card: #ffffff;
      --shadow: 0 6px 18px rgba(31, 41, 55, 0.08);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Segoe UI", sans-serif;
    }

    .app {
      width: min(1200px, 100%);
      margin: 0 auto;
      padding: 24px 18px 48px;
      display: grid;
      gap: 24px;
    }

    .card {
      background: var(--card);
      border-radius: 10px;
      box-shadow: var(--shadow);
      padding: 20px;
    }

    header.card {
      display: flex;
      flex-wrap: wrap;
      align-items: center;
      justify-content: space-between;
      gap: 12px;
    }

    h1 {
      margin: 0;
      font-size: 1.2rem;
    }

    h2 {
      margin: 0 0 14px;
      font-size: 1.05rem;
    }

    form {
      display: inline-flex;
      align-items: center;
      gap: 8px;
      font-size: 0.9rem;
    }

    select,
    button {
      border: 1px solid #d1d5db;
      border-radius: 6px;
      padding: 6px 10px;
      font-size: 0.9rem;
      background: white;
    }

    button {
      cursor: pointer;
      border-color: var(--accent);
      color: var(--accent);
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
      gap: 16px;
    }

    .stat {
      background: var(--card);
      border-radius: 10px;
      box-shadow: var(--shadow);
      border-left: 4px solid var(--accent);
      padding: 18px;
      display: grid;
      gap: 6px;
    }

    .stat .label {
      color: var(--muted);
      font-size: 0.9rem;
    }

    .stat .value {
      font-size: 1.5rem;
      font-weight: 700;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(420px, 1fr));
      gap: 24px;
    }

    .bar-row {
      display: grid;
      grid-template-columns: 56px 1fr 140px;
      align-items: center;
      gap: 10px;
      margin-bottom: 6px;
      font-size: 0.85rem;
    }

    .bar {
      display: block;
      height: 14px;
      min-width: 2px;
      border-radius: 4px;
      background: var(--accent);
    }

    .bar-value {
      text-align: right;
      color: var(--muted);
    }

    table {
      width: 100%;
      border-collapse: collapse;
      font-size: 0.9rem;
    }

    th,
    td {
      padding: 8px 6px;
      border-bottom: 1px solid #e5e7eb;
      text-align: left;
    }

    th {
      color: var(--muted);
      font-weight: 600;
      background: var(--accent-soft);
    }

    .num {
      text-align: right;
    }

    .empty {
      color: var(--muted);
      text-align: center;
    }

    @media (max-width: 600px) {
      .grid {
        grid-template-columns: 1fr;
      }
    }
  </style>
</head>
<body>
  <main class="app">
    <header class="card">
      <h1>Dashboard</h1>
      <form method="get" action="/">
        <label for="days">Period:</label>
        <select id="days" name="days" onchange="this.form.submit()">
{{WINDOW_OPTIONS}}        </select>
        <noscript><button type="submit">Apply</button></noscript>
      </form>
      <form method="post" action="/refresh?days={{WINDOW}}">
        <button type="submit">Refresh data</button>
      </form>
    </header>

    <section class="panel">
{{KPI_CARDS}}    </section>

    <section class="card">
      <h2>Sales (last {{WINDOW}} days)</h2>
{{DAILY_BARS}}    </section>

    <section class="grid">
      <div class="card">
        <h2>Top clients (last {{WINDOW}} days)</h2>
        <table>
          <thead><tr><th>#</th><th>Client</th><th class="num">Billing</th></tr></thead>
          <tbody>
{{TOP_CLIENTS}}          </tbody>
        </table>
      </div>
      <div class="card">
        <h2>Top 10 contacts by sales</h2>
        <table>
          <thead><tr><th>Contact</th><th class="num">Sales</th></tr></thead>
          <tbody>
{{TOP_CONTACTS}}          </tbody>
        </table>
      </div>
      <div class="card">
        <h2>Clients by status</h2>
        <table>
          <thead><tr><th>Status</th><th class="num">Clients</th><th class="num">Share</th></tr></thead>
          <tbody>
{{STATUS_ROWS}}          </tbody>
        </table>
      </div>
      <div class="card">
        <h2>Churn by classification</h2>
        <table>
          <thead><tr><th>Classification</th><th class="num">Clients</th><th class="num">Total billing</th><th class="num">Average billing</th></tr></thead>
          <tbody>
{{CHURN_ROWS}}          </tbody>
        </table>
      </div>
    </section>
  </main>
</body>
</html>
"#;
