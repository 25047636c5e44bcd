pub mod digitalocean;

use crate::error::SpinupResult;
use crate::model::{DomainRecord, NewRecord, Subdomain};

/// Labels that are never reported as subdomains.
pub const RESERVED_LABELS: [&str; 2] = ["@", "api"];

/// Records of one provider-hosted root domain.
pub trait DnsProvider: Send + Sync {
    /// The root domain these records live under.
    fn domain(&self) -> &str;

    fn list_records(&self) -> SpinupResult<Vec<DomainRecord>>;

    fn create_record(&self, record: &NewRecord) -> SpinupResult<DomainRecord>;

    fn delete_record(&self, id: u64) -> SpinupResult<()>;
}

/// Keep the `A` records that name a subdomain, skipping the apex and
/// reserved labels.
#[must_use]
pub fn subdomains(domain: &str, records: &[DomainRecord]) -> Vec<Subdomain> {
    records
        .iter()
        .filter(|r| r.kind == "A" && !RESERVED_LABELS.contains(&r.name.as_str()))
        .map(|r| Subdomain {
            id: r.id,
            subdomain: r.name.clone(),
            domain: domain.to_string(),
            ip: r.data.clone(),
        })
        .collect()
}

/// `label.domain`
#[must_use]
pub fn fqdn(label: &str, domain: &str) -> String {
    format!("{label}.{domain}")
}
