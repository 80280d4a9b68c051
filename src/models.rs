use crate::coerce;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SALE_KINDS: [&str; 2] = ["Sale", "Venta"];

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChurnRecord {
    #[serde(default, alias = "clasificacion", deserialize_with = "coerce::text_or_empty")]
    pub classification: String,
    #[serde(default, alias = "facturacion_total", deserialize_with = "coerce::amount")]
    pub total_billing: f64,
    #[serde(default, alias = "ultimo_pedido", deserialize_with = "coerce::timestamp")]
    pub last_order_date: Option<DateTime<FixedOffset>>,
    #[serde(default, alias = "cantidad_pedidos", deserialize_with = "coerce::count")]
    pub order_count: u64,
    #[serde(default, alias = "contacto", deserialize_with = "coerce::text")]
    pub contact_name: Option<String>,
}

impl coerce::Aliased for ChurnRecord {
    const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("classification", "clasificacion"),
        ("totalBilling", "facturacion_total"),
        ("lastOrderDate", "ultimo_pedido"),
        ("orderCount", "cantidad_pedidos"),
        ("contactName", "contacto"),
    ];
}

impl ChurnRecord {
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.classification.starts_with(prefix)
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    #[serde(default, alias = "type", deserialize_with = "coerce::text_or_empty")]
    pub kind: String,
    #[serde(default, deserialize_with = "coerce::timestamp")]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default, alias = "value", deserialize_with = "coerce::amount")]
    pub amount: f64,
    #[serde(default, alias = "contact", deserialize_with = "coerce::text")]
    pub contact_name: Option<String>,
}

impl coerce::Aliased for Movement {
    const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("kind", "type"),
        ("amount", "value"),
        ("contactName", "contact"),
    ];
}

impl Movement {
    pub fn is_sale(&self) -> bool {
        SALE_KINDS.contains(&self.kind.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ClientRecord {
    #[serde(default, deserialize_with = "coerce::text")]
    pub status: Option<String>,
}

impl coerce::Aliased for ClientRecord {}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsBlob {
    #[serde(
        default,
        alias = "clientes_sin_contacto_30d",
        deserialize_with = "coerce::count"
    )]
    pub contacts_with_no_recent_contact_30d: u64,
}

impl coerce::Aliased for StatsBlob {
    const ALIASES: &'static [(&'static str, &'static str)] = &[(
        "contactsWithNoRecentContact30d",
        "clientes_sin_contacto_30d",
    )];
}

/// Everything the dashboard aggregates over. Loaded and replaced as a unit.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "coerce::records")]
    pub clients: Vec<ClientRecord>,
    #[serde(default, deserialize_with = "coerce::records")]
    pub movements: Vec<Movement>,
    #[serde(default, alias = "churnRecords", deserialize_with = "coerce::records")]
    pub churn: Vec<ChurnRecord>,
    #[serde(default, deserialize_with = "coerce::object_or_default")]
    pub stats: StatsBlob,
}

impl coerce::Aliased for Snapshot {
    const ALIASES: &'static [(&'static str, &'static str)] = &[("churn", "churnRecords")];
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Kpis {
    pub total_clients: u64,
    pub active_clients: u64,
    pub lost_clients: u64,
    pub no_contact_30d: u64,
    pub total_revenue: f64,
    pub windowed_revenue: f64,
    pub windowed_order_count: u64,
    pub avg_ticket: f64,
    pub all_time_churn_revenue: f64,
    pub new_clients_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopClient {
    pub name: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayRevenue {
    pub date: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactRevenue {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusShare {
    pub status: String,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationSummary {
    pub classification: String,
    pub count: u64,
    pub total_billing: f64,
    pub avg_billing: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub window_days: i64,
    pub kpis: Kpis,
    pub top_clients: Vec<TopClient>,
    pub revenue_by_day: Vec<DayRevenue>,
    pub revenue_by_contact: Vec<ContactRevenue>,
    pub status_breakdown: Vec<StatusShare>,
    pub classification_breakdown: Vec<ClassificationSummary>,
    pub status_counts: BTreeMap<String, u64>,
    pub classification_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub clients: usize,
    pub movements: usize,
    pub churn: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<String>,
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_accepts_backend_field_names() {
        let raw = json!({
            "clients": [{ "status": "Activo" }, { "status": null }],
            "movements": [
                { "type": "Venta", "date": "2026-01-10T12:00:00", "value": "1500", "contact": "Ana" }
            ],
            "churn": [
                {
                    "clasificacion": "1.1",
                    "facturacion_total": 1000,
                    "ultimo_pedido": "2026-01-09T08:00:00",
                    "cantidad_pedidos": 4,
                    "contacto": "Ana"
                }
            ],
            "stats": { "clientes_sin_contacto_30d": 5 }
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.clients.len(), 2);
        assert_eq!(snapshot.clients[1].status, None);

        let movement = &snapshot.movements[0];
        assert!(movement.is_sale());
        assert_eq!(movement.amount, 1500.0);
        assert_eq!(movement.contact_name.as_deref(), Some("Ana"));
        assert!(movement.date.is_some());

        let churn = &snapshot.churn[0];
        assert_eq!(churn.classification, "1.1");
        assert_eq!(churn.total_billing, 1000.0);
        assert_eq!(churn.order_count, 4);
        assert!(churn.last_order_date.is_some());
        assert_eq!(snapshot.stats.contacts_with_no_recent_contact_30d, 5);
    }

    #[test]
    fn snapshot_accepts_camel_case_names() {
        let raw = json!({
            "movements": [{ "kind": "Sale", "date": "2026-01-10T12:00:00Z", "amount": 20, "contactName": "Bo" }],
            "churnRecords": [{ "classification": "4.1", "totalBilling": 10, "orderCount": 1 }],
            "stats": { "contactsWithNoRecentContact30d": 2 }
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        assert!(snapshot.clients.is_empty());
        assert_eq!(snapshot.movements[0].amount, 20.0);
        assert_eq!(snapshot.churn[0].classification, "4.1");
        assert_eq!(snapshot.churn[0].last_order_date, None);
        assert_eq!(snapshot.stats.contacts_with_no_recent_contact_30d, 2);
    }

    #[test]
    fn malformed_fields_and_elements_never_fail_the_snapshot() {
        let raw = json!({
            "clients": "not a list",
            "movements": [42, { "type": "Venta", "date": "soon", "value": "lots" }],
            "churn": [{ "clasificacion": 1.2, "facturacion_total": null, "cantidad_pedidos": "x" }],
            "stats": []
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        assert!(snapshot.clients.is_empty());
        assert_eq!(snapshot.movements.len(), 1);
        assert_eq!(snapshot.movements[0].amount, 0.0);
        assert_eq!(snapshot.movements[0].date, None);
        assert_eq!(snapshot.churn[0].classification, "1.2");
        assert_eq!(snapshot.churn[0].total_billing, 0.0);
        assert_eq!(snapshot.churn[0].order_count, 0);
        assert_eq!(snapshot.stats, StatsBlob::default());
    }

    #[test]
    fn field_name_wins_over_its_alias() {
        let raw = json!({
            "movements": [{ "kind": "Sale", "type": "Gasto", "amount": 5, "value": 900 }],
            "churn": [{ "classification": "2.1", "clasificacion": "4.1", "totalBilling": 10 }],
            "churnRecords": [{ "classification": "9.9" }, { "classification": "9.8" }],
            "stats": { "contactsWithNoRecentContact30d": 1, "clientes_sin_contacto_30d": 7 }
        });

        let snapshot: Snapshot = coerce::decode(raw).unwrap();
        assert_eq!(snapshot.movements.len(), 1);
        assert!(snapshot.movements[0].is_sale());
        assert_eq!(snapshot.movements[0].amount, 5.0);
        assert_eq!(snapshot.churn.len(), 1);
        assert_eq!(snapshot.churn[0].classification, "2.1");
        assert_eq!(snapshot.stats.contacts_with_no_recent_contact_30d, 1);
    }

    #[test]
    fn only_sales_are_sales() {
        let sale = Movement { kind: "Sale".into(), ..Movement::default() };
        let refund = Movement { kind: "Gasto".into(), ..Movement::default() };
        assert!(sale.is_sale());
        assert!(!refund.is_sale());
    }
}
