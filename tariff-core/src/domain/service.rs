use serde::Serialize;

use crate::domain::MeterRecord;

/// One service found in an uploaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub service_no: String,
    pub client_name: String,
    pub region: String,
    pub subscribed_power: f64,
    pub rows: usize,
}

/// Services present in `records`, in first-seen order.
pub fn services(records: &[MeterRecord]) -> Vec<ServiceSummary> {
    let mut out: Vec<ServiceSummary> = Vec::new();
    for r in records {
        match out.iter_mut().find(|s| s.service_no == r.service_no) {
            Some(summary) => summary.rows += 1,
            None => out.push(ServiceSummary {
                service_no: r.service_no.clone(),
                client_name: r.client_name.clone(),
                region: r.region.clone(),
                subscribed_power: r.subscribed_power,
                rows: 1,
            }),
        }
    }
    out
}

/// Rows of a single service; service numbers are compared trimmed.
pub fn select_service(records: &[MeterRecord], service_no: &str) -> Vec<MeterRecord> {
    let wanted = service_no.trim();
    records
        .iter()
        .filter(|r| r.service_no.trim() == wanted)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meter_record::fixtures::record;

    #[test]
    fn lists_services_in_first_seen_order() {
        let mut other = record(2024, 2, 450.0, 400.0);
        other.service_no = "SRV-777".to_string();
        other.client_name = "Brasserie".to_string();
        let records = vec![
            record(2024, 1, 3000.0, 2900.0),
            other.clone(),
            record(2024, 2, 3000.0, 2950.0),
        ];

        let listed = services(&records);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].service_no, "SRV-001");
        assert_eq!(listed[0].rows, 2);
        assert_eq!(listed[1].client_name, "Brasserie");
        assert_eq!(listed[1].subscribed_power, 450.0);

        assert_eq!(select_service(&records, " SRV-777 "), vec![other]);
        assert!(select_service(&records, "missing").is_empty());
    }
}
