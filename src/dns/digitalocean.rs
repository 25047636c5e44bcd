use tracing::info;

use crate::api::ApiClient;
use crate::config::Config;
use crate::dns::DnsProvider;
use crate::error::SpinupResult;
use crate::model::{DomainRecord, NewRecord};

/// `DigitalOcean` hosted DNS for a single root domain.
pub struct DigitalOceanDns {
    api: ApiClient,
    domain: String,
}

impl DigitalOceanDns {
    pub fn new(config: &Config) -> SpinupResult<Self> {
        let domain = config.require_domain()?.to_string();
        Ok(Self {
            api: ApiClient::new(&config.api_url, &config.token)?,
            domain,
        })
    }
}

impl DnsProvider for DigitalOceanDns {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn list_records(&self) -> SpinupResult<Vec<DomainRecord>> {
        self.api.list(
            &format!("/domains/{}/records", self.domain),
            "domain_records",
        )
    }

    fn create_record(&self, record: &NewRecord) -> SpinupResult<DomainRecord> {
        let created: DomainRecord = self.api.post(
            &format!("/domains/{}/records", self.domain),
            record,
            "domain_record",
        )?;
        info!(
            record_id = created.id,
            name = %created.name,
            data = %created.data,
            domain = %self.domain,
            "A record created"
        );
        Ok(created)
    }

    fn delete_record(&self, id: u64) -> SpinupResult<()> {
        self.api
            .delete(&format!("/domains/{}/records/{id}", self.domain))
    }
}
