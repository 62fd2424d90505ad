#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub stripe: Stripe,
    pub email: Email,
    pub frontend: Frontend,
    pub sweep: CommitmentSweep,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub resend_api_key: String,
    pub from: String,
    pub admin_email: String,
}

#[derive(Debug, Clone)]
pub struct Frontend {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CommitmentSweep {
    /// Bearer token for the internal trigger; the route answers 503 when unset.
    pub internal_token: Option<String>,
    pub interval_secs: u64,
}
