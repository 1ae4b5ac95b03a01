use std::env;

/// Credentials for the payment processor API.
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub stripe: StripeSettings,
    /// Where the processor redirects the participant after paying.
    pub checkout_success_url: String,
    /// Where the processor redirects the participant on cancel/abandon.
    pub checkout_cancel_url: String,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("ROLLCALL_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let checkout_success_url = env::var("CHECKOUT_SUCCESS_URL")
            .unwrap_or_else(|_| format!("{}/checkout/success", base_url));
        let checkout_cancel_url = env::var("CHECKOUT_CANCEL_URL")
            .unwrap_or_else(|_| format!("{}/checkout/cancel", base_url));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "rollcall.db".to_string()),
            base_url,
            stripe: StripeSettings {
                secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            },
            checkout_success_url,
            checkout_cancel_url,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
