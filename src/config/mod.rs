//! Runtime configuration for the demo binary
//!
//! Flags with environment fallbacks; a `.env` file is honored via `dotenvy`
//! in `main`. The client secret is accepted only through flag/env and is
//! redacted everywhere it could be printed.

use crate::auth::Credentials;
use clap::Parser;
use url::Url;

/// Command-line / environment configuration.
#[derive(Debug, Parser)]
#[command(
    name = "batchlink",
    version,
    about = "Run a local-reference batch workflow against a FHIR-style API"
)]
pub struct AppConfig {
    /// Base URL of the batch endpoint (transaction bundles are POSTed here)
    #[arg(long, env = "BATCHLINK_BASE_URL")]
    pub base_url: Url,

    /// OAuth2 token endpoint for the client-credentials exchange
    #[arg(long, env = "BATCHLINK_TOKEN_URL")]
    pub token_url: Url,

    /// OAuth2 client id
    #[arg(long, env = "BATCHLINK_CLIENT_ID")]
    pub client_id: String,

    /// OAuth2 client secret
    #[arg(long, env = "BATCHLINK_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Request timeout in seconds for every network call
    #[arg(long, env = "BATCHLINK_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Medical record number used by the demo scenario's conditional create
    #[arg(long, env = "BATCHLINK_MRN", default_value = "MRN-0001")]
    pub mrn: String,
}

impl AppConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.client_id.clone(), self.client_secret.clone())
    }
}
