//! Outbound Z-API client — text sends, button-list sends, profile lookups.

use async_trait::async_trait;
use leadflow_core::{
    config::ZapiConfig,
    error::LeadflowError,
    traits::{ButtonOption, Messenger, PlatformProfile},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Z-API REST client.
///
/// All requests go to `{base_url}/{instance_id}/token/{instance_token}/...`
/// with the account `Client-Token` header.
pub struct ZapiClient {
    client: reqwest::Client,
    base_url: String,
    client_token: String,
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendButtonListRequest<'a> {
    phone: &'a str,
    message: &'a str,
    button_list: ButtonListBody<'a>,
}

#[derive(Serialize)]
struct ButtonListBody<'a> {
    buttons: &'a [ButtonOption],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Deserialize)]
struct ProfilePictureResponse {
    link: Option<String>,
}

#[derive(Deserialize)]
struct ContactInfoResponse {
    name: Option<String>,
    vname: Option<String>,
    #[serde(rename = "imgUrl")]
    img_url: Option<String>,
}

impl ZapiClient {
    /// Create from config values.
    pub fn from_config(config: &ZapiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!(
                "{}/{}/token/{}",
                config.base_url, config.instance_id, config.instance_token
            ),
            client_token: config.client_token.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{path}", self.base_url))
            .header("Client-Token", &self.client_token)
    }

    fn get(&self, path_and_query: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{path_and_query}", self.base_url))
            .header("Client-Token", &self.client_token)
    }
}

#[async_trait]
impl Messenger for ZapiClient {
    fn name(&self) -> &str {
        "zapi"
    }

    async fn send_text(&self, phone: &str, body: &str) -> Result<(), LeadflowError> {
        let resp = self
            .post("send-text")
            .json(&SendTextRequest {
                phone,
                message: body,
            })
            .send()
            .await
            .map_err(|e| LeadflowError::Gateway(format!("zapi send-text failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LeadflowError::Gateway(format!(
                "zapi send-text returned {status}: {text}"
            )));
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| LeadflowError::Gateway(format!("zapi: failed to parse response: {e}")))?;
        info!(
            "message sent to {phone} (id: {})",
            parsed.message_id.as_deref().unwrap_or("?")
        );
        Ok(())
    }

    async fn send_button_list(
        &self,
        phone: &str,
        body: &str,
        options: &[ButtonOption],
    ) -> Result<(), LeadflowError> {
        let resp = self
            .post("send-button-list")
            .json(&SendButtonListRequest {
                phone,
                message: body,
                button_list: ButtonListBody { buttons: options },
            })
            .send()
            .await
            .map_err(|e| LeadflowError::Gateway(format!("zapi send-button-list failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LeadflowError::Gateway(format!(
                "zapi send-button-list returned {status}: {text}"
            )));
        }

        info!("button list sent to {phone} ({} options)", options.len());
        Ok(())
    }

    async fn profile_picture(&self, phone: &str) -> Option<String> {
        let resp = match self
            .get(&format!("profile-picture?phone={phone}"))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("zapi profile-picture for {phone} returned {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("zapi profile-picture lookup for {phone} failed: {e}");
                return None;
            }
        };

        match resp.json::<ProfilePictureResponse>().await {
            Ok(parsed) => parsed.link,
            Err(e) => {
                warn!("zapi profile-picture parse failed: {e}");
                None
            }
        }
    }

    async fn contact_info(&self, phone: &str) -> Option<PlatformProfile> {
        let resp = match self.get(&format!("contacts/{phone}")).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("zapi contact lookup for {phone} returned {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("zapi contact lookup for {phone} failed: {e}");
                return None;
            }
        };

        match resp.json::<ContactInfoResponse>().await {
            Ok(parsed) => {
                debug!("zapi contact info resolved for {phone}");
                Some(PlatformProfile {
                    name: parsed.name.or(parsed.vname),
                    avatar_url: parsed.img_url,
                })
            }
            Err(e) => {
                warn!("zapi contact info parse failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_composition() {
        let config = ZapiConfig {
            base_url: "https://api.z-api.io/instances".into(),
            instance_id: "INST".into(),
            instance_token: "TOK".into(),
            client_token: "SECRET".into(),
            service_numbers: vec![],
        };
        let client = ZapiClient::from_config(&config);
        assert_eq!(client.base_url, "https://api.z-api.io/instances/INST/token/TOK");
        assert_eq!(client.name(), "zapi");
    }

    #[test]
    fn test_send_text_serialization() {
        let body = SendTextRequest {
            phone: "5511999990000",
            message: "Olá!",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["phone"], "5511999990000");
        assert_eq!(json["message"], "Olá!");
    }

    #[test]
    fn test_send_button_list_serialization() {
        let options = vec![
            ButtonOption::new("1", "Site profissional"),
            ButtonOption::new("2", "Loja virtual"),
        ];
        let body = SendButtonListRequest {
            phone: "5511999990000",
            message: "Escolha:",
            button_list: ButtonListBody { buttons: &options },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["buttonList"]["buttons"][0]["id"], "1");
        assert_eq!(json["buttonList"]["buttons"][1]["label"], "Loja virtual");
    }

    #[test]
    fn test_contact_info_response_parsing() {
        let json = r#"{"name":"Ana","vname":"Ana S.","imgUrl":"https://pps.example/a.jpg"}"#;
        let parsed: ContactInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Ana"));
        assert_eq!(parsed.img_url.as_deref(), Some("https://pps.example/a.jpg"));
    }

    #[test]
    fn test_profile_picture_response_parsing() {
        let json = r#"{"link":"https://pps.example/a.jpg"}"#;
        let parsed: ProfilePictureResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.link.as_deref(), Some("https://pps.example/a.jpg"));
    }
}
