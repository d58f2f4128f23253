use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::SmsConfig;

/// Outbound SMS. `Twilio` talks to the real provider; `Outbox` keeps
/// messages in memory and logs them, for development and tests.
#[derive(Clone)]
pub enum SmsClient {
    Twilio(TwilioSender),
    Outbox(Outbox),
}

impl SmsClient {
    /// Twilio when credentials are configured, otherwise the local outbox.
    pub fn from_config(config: &SmsConfig) -> Result<Self> {
        match (&config.account_sid, &config.auth_token) {
            (Some(sid), Some(token)) => Ok(Self::Twilio(TwilioSender::new(config, sid, token)?)),
            _ => {
                warn!("SMS credentials not configured; reset codes will only be logged");
                Ok(Self::Outbox(Outbox::default()))
            }
        }
    }

    /// Deliver `body` and return the provider's delivery id.
    pub async fn send(&self, body: &str, from: &str, to: &str) -> Result<String> {
        match self {
            Self::Twilio(sender) => sender.send(body, from, to).await,
            Self::Outbox(outbox) => Ok(outbox.push(body, from, to)),
        }
    }
}

#[derive(Clone)]
pub struct TwilioSender {
    http: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: Option<String>,
}

impl TwilioSender {
    fn new(config: &SmsConfig, account_sid: &str, auth_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let messages_url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            account_sid
        );

        Ok(Self {
            http,
            messages_url,
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    async fn send(&self, body: &str, from: &str, to: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Body", body), ("From", from), ("To", to)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.json::<TwilioError>().await.ok();
            let (code, message) = detail
                .map(|d| (d.code, d.message))
                .unwrap_or((None, None));
            return Err(anyhow!(
                "Twilio returned {} (code {:?}): {}",
                status,
                code,
                message.unwrap_or_default()
            ));
        }

        let message: TwilioMessage = response.json().await?;
        info!("SMS queued with Twilio: {}", message.sid);
        Ok(message.sid)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentSms {
    pub sid: String,
    pub body: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<SentSms>>>,
}

impl Outbox {
    fn push(&self, body: &str, from: &str, to: &str) -> String {
        let mut sent = self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let sid = format!("outbox-{}", sent.len() + 1);
        info!("SMS {} from {} to {}: {}", sid, from, to, body);
        sent.push(SentSms {
            sid: sid.clone(),
            body: body.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
        sid
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn last(&self) -> Option<SentSms> {
        self.sent().pop()
    }
}
